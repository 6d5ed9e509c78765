use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cqa");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.txt"),
        "Alpha document about Rust programming.\n\nIt covers cargo and crates in detail.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.txt"),
        "Beta document about deployment.\n\n\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();
    fs::write(files_dir.join("sheet.xlsx"), "not really a spreadsheet").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/cqa.sqlite"

[storage]
upload_dir = "{root}/data/uploads"
processed_dir = "{root}/data/processed"

[chunking]
max_tokens = 500

[retrieval]
top_k = 3

[server]
bind = "127.0.0.1:7431"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("cqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn ingest_file(config_path: &Path, root: &Path, name: &str) -> String {
    let file = root.join("files").join(name);
    let (stdout, stderr, success) =
        run_cqa(config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: {}{}", stdout, stderr);

    // "ingested <name> as <doc_id>"
    let line = stdout.lines().next().unwrap();
    line.rsplit(' ').next().unwrap().to_string()
}

#[test]
fn test_init_creates_database_and_dirs() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cqa(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("ok"));
    assert!(tmp.path().join("data/cqa.sqlite").exists());
    assert!(tmp.path().join("data/uploads").is_dir());
    assert!(tmp.path().join("data/processed").is_dir());

    // Running init again is harmless.
    let (_, stderr, success) = run_cqa(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_ingest_text_document() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    let file = tmp.path().join("files/alpha.txt");
    let (stdout, stderr, success) =
        run_cqa(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: {}{}", stdout, stderr);
    assert!(stdout.contains("kind: text"));
    assert!(stdout.contains("pages: 1"));
    assert!(stdout.contains("paragraphs: 2"));
    assert!(stdout.contains("chunks: 1"));
    // No embedding provider configured, chunks stay pending.
    assert!(stdout.contains("indexed: 0"));
    assert!(stdout.contains("pending: 1"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_rejects_unknown_extension() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    let file = tmp.path().join("files/sheet.xlsx");
    let (stdout, stderr, success) =
        run_cqa(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(!success);
    let combined = format!("{}{}", stdout, stderr);
    assert!(combined.contains("unsupported file type"));
    assert!(combined.contains("pdf, jpg, jpeg, png, txt"));
}

#[test]
fn test_list_and_get_show_hierarchy() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    let id_a = ingest_file(&config_path, tmp.path(), "alpha.txt");
    let id_b = ingest_file(&config_path, tmp.path(), "beta.txt");

    let (stdout, _, success) = run_cqa(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains(&id_a));
    assert!(stdout.contains(&id_b));
    assert!(stdout.contains("alpha.txt"));
    assert!(stdout.contains("2 document(s)"));

    let (stdout, _, success) = run_cqa(&config_path, &["get", &id_a]);
    assert!(success);
    assert!(stdout.contains("page 1 (2 paragraph(s))"));
    assert!(stdout.contains("[1] Alpha document about Rust programming."));
    assert!(stdout.contains("[2] It covers cargo and crates in detail."));
}

#[test]
fn test_paragraph_numbering_keeps_gaps() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    // beta.txt has an empty section between its two paragraphs.
    let id = ingest_file(&config_path, tmp.path(), "beta.txt");
    let (stdout, _, success) = run_cqa(&config_path, &["get", &id]);
    assert!(success);
    assert!(stdout.contains("[1] Beta document about deployment."));
    assert!(stdout.contains("[3] Kubernetes and Docker are mentioned here."));
    assert!(!stdout.contains("[2]"));
}

#[test]
fn test_get_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    let (stdout, stderr, success) = run_cqa(&config_path, &["get", "nope"]);
    assert!(!success);
    assert!(format!("{}{}", stdout, stderr).contains("no such document"));
}

#[test]
fn test_delete_removes_document() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    let id = ingest_file(&config_path, tmp.path(), "alpha.txt");

    let (stdout, _, success) = run_cqa(&config_path, &["delete", &id]);
    assert!(success);
    assert!(stdout.contains(&format!("deleted {}", id)));

    let (stdout, _, success) = run_cqa(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("0 document(s)"));

    let (_, _, success) = run_cqa(&config_path, &["get", &id]);
    assert!(!success);

    // Deleting again reports not found.
    let (_, _, success) = run_cqa(&config_path, &["delete", &id]);
    assert!(!success);
}

#[test]
fn test_clear_empties_corpus() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    ingest_file(&config_path, tmp.path(), "alpha.txt");
    ingest_file(&config_path, tmp.path(), "beta.txt");

    let (stdout, _, success) = run_cqa(&config_path, &["clear"]);
    assert!(success, "clear failed: {}", stdout);

    let (stdout, _, success) = run_cqa(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("0 document(s)"));
}

#[test]
fn test_ingest_writes_json_artifact() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    let id = ingest_file(&config_path, tmp.path(), "alpha.txt");
    let artifact = tmp.path().join("data/processed").join(format!("{}.json", id));
    assert!(artifact.is_file(), "missing artifact {:?}", artifact);

    let content = fs::read_to_string(&artifact).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed["document_id"], id.as_str());
    assert_eq!(parsed["kind"], "text");
    assert_eq!(parsed["pages"][0]["page_number"], 1);
    assert_eq!(
        parsed["pages"][0]["paragraphs"][0]["content"],
        "Alpha document about Rust programming."
    );
}

#[test]
fn test_export_matches_artifact() {
    let (tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    let id = ingest_file(&config_path, tmp.path(), "alpha.txt");
    let out = tmp.path().join("export.json");
    let (stdout, stderr, success) = run_cqa(
        &config_path,
        &["export", &id, "--output", out.to_str().unwrap()],
    );
    assert!(success, "export failed: {}{}", stdout, stderr);

    let exported = fs::read_to_string(&out).unwrap();
    let artifact = fs::read_to_string(
        tmp.path().join("data/processed").join(format!("{}.json", id)),
    )
    .unwrap();
    let a: serde_json::Value = serde_json::from_str(&exported).unwrap();
    let b: serde_json::Value = serde_json::from_str(&artifact).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_ask_with_empty_corpus_short_circuits() {
    let (_tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    // Providers are disabled; the empty-corpus answer must not need them.
    let (stdout, stderr, success) = run_cqa(&config_path, &["ask", "What is this about?"]);
    assert!(success, "ask failed: {}{}", stdout, stderr);
    assert!(stdout.contains("No documents have been processed yet."));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ask_with_themes_requires_generative_provider() {
    let (_tmp, config_path) = setup_test_env();
    run_cqa(&config_path, &["init"]);

    // The answer row always reaches the theme pass, so a model is required
    // even on an empty corpus.
    let (stdout, stderr, success) = run_cqa(&config_path, &["ask", "Anything?", "--themes"]);
    assert!(!success);
    assert!(format!("{}{}", stdout, stderr).contains("generative provider"));
}
