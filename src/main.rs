use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use corpus_qa::answer::{answer_question, EMPTY_CORPUS_MESSAGE};
use corpus_qa::config::{ensure_storage_dirs, load_config};
use corpus_qa::db;
use corpus_qa::embedding::create_embedding_client;
use corpus_qa::export;
use corpus_qa::generative::create_generative_client;
use corpus_qa::index::SqliteVectorIndex;
use corpus_qa::ingest::ingest_document;
use corpus_qa::migrate::run_migrations;
use corpus_qa::models::{AnswerRow, DocumentKind};
use corpus_qa::ocr::TesseractOcr;
use corpus_qa::server::run_server;
use corpus_qa::store;
use corpus_qa::themes::synthesize_themes;

#[derive(Parser)]
#[command(name = "cqa", about = "Document ingestion and corpus question answering", version)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = "./config/cqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and storage directories
    Init,
    /// Ingest a document into the corpus
    Ingest {
        /// Path to the source file
        path: PathBuf,
        /// Override kind detection: pdf, image, or text
        #[arg(long)]
        kind: Option<String>,
    },
    /// List ingested documents
    List,
    /// Show a document's extracted pages and paragraphs
    Get {
        /// Document id
        id: String,
    },
    /// Delete a document and its index entries
    Delete {
        /// Document id
        id: String,
    },
    /// Remove all documents and index entries
    Clear,
    /// Ask a question against the corpus
    Ask {
        /// The question
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        k: Option<usize>,
        /// Also synthesize themes across the cited evidence
        #[arg(long)]
        themes: bool,
    },
    /// Write a document's JSON artifact to stdout or a file
    Export {
        /// Document id
        id: String,
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the HTTP API server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            run_migrations(&config).await?;
            ensure_storage_dirs(&config)?;
            println!("initialized database at {}", config.db.path.display());
            println!("ok");
        }
        Commands::Ingest { path, kind } => {
            run_migrations(&config).await?;
            ensure_storage_dirs(&config)?;
            let pool = db::connect(&config.db).await?;
            let index = SqliteVectorIndex::new(pool.clone());
            let ocr = TesseractOcr::new(config.ocr.clone());

            let override_kind = match kind.as_deref() {
                Some(s) => Some(
                    DocumentKind::parse(s)
                        .ok_or_else(|| anyhow::anyhow!("unknown document kind: {}", s))?,
                ),
                None => None,
            };

            let embedder = if config.embedding.is_enabled() {
                Some(create_embedding_client(&config.embedding)?)
            } else {
                None
            };

            let report =
                ingest_document(&config, &pool, &index, embedder, &ocr, &path, override_kind)
                    .await?;

            println!("ingested {} as {}", report.filename, report.doc_id);
            println!(
                "  kind: {}  pages: {}  paragraphs: {}  chunks: {}",
                report.kind, report.pages, report.paragraphs, report.chunks
            );
            println!("  indexed: {}  pending: {}", report.indexed, report.pending);
            println!("ok");
        }
        Commands::List => {
            let pool = db::connect(&config.db).await?;
            let docs = store::list_documents(&pool).await?;
            for doc in &docs {
                println!("{}  {}  {}", doc.id, doc.kind, doc.filename);
            }
            println!("{} document(s)", docs.len());
            println!("ok");
        }
        Commands::Get { id } => {
            let pool = db::connect(&config.db).await?;
            match store::get_document_tree(&pool, &id).await? {
                Some(tree) => {
                    println!(
                        "{}  {}  {}",
                        tree.document.id, tree.document.kind, tree.document.filename
                    );
                    for (page, paragraphs) in &tree.pages {
                        println!("page {} ({} paragraph(s))", page.page_number, paragraphs.len());
                        for para in paragraphs {
                            println!("  [{}] {}", para.paragraph_number, para.content);
                        }
                    }
                    println!("ok");
                }
                None => {
                    anyhow::bail!("no such document: {}", id);
                }
            }
        }
        Commands::Delete { id } => {
            let pool = db::connect(&config.db).await?;
            let index = SqliteVectorIndex::new(pool.clone());
            if store::delete_document(&pool, &index, &id).await? {
                println!("deleted {}", id);
                println!("ok");
            } else {
                anyhow::bail!("no such document: {}", id);
            }
        }
        Commands::Clear => {
            let pool = db::connect(&config.db).await?;
            let index = SqliteVectorIndex::new(pool.clone());
            store::clear_all(&pool, &index).await?;
            println!("cleared corpus");
            println!("ok");
        }
        Commands::Ask {
            question,
            k,
            themes,
        } => {
            let pool = db::connect(&config.db).await?;
            let k = k.unwrap_or(config.retrieval.top_k);

            let rows = if store::count_documents(&pool).await? == 0 {
                vec![AnswerRow::new("Answer", EMPTY_CORPUS_MESSAGE, "", "")]
            } else {
                let embedder = create_embedding_client(&config.embedding)?;
                let generator = create_generative_client(&config.generative)?;
                let index = SqliteVectorIndex::new(pool.clone());
                answer_question(&pool, &embedder, &index, &generator, &question, k).await?
            };

            print_rows(&rows);

            if themes {
                let generator = create_generative_client(&config.generative)?;
                let theme_rows = synthesize_themes(&generator, &rows).await?;
                println!();
                print_rows(&theme_rows);
            }
            println!("ok");
        }
        Commands::Export { id, output } => {
            let pool = db::connect(&config.db).await?;
            match export::build_export(&pool, &id).await? {
                Some(doc) => {
                    match output {
                        Some(path) => {
                            export::write_export(&doc, &path)?;
                            println!("wrote {}", path.display());
                        }
                        None => {
                            println!("{}", serde_json::to_string_pretty(&doc)?);
                        }
                    }
                    println!("ok");
                }
                None => {
                    anyhow::bail!("no such document: {}", id);
                }
            }
        }
        Commands::Serve => {
            run_migrations(&config).await?;
            run_server(config).await?;
        }
    }

    Ok(())
}

fn print_rows(rows: &[AnswerRow]) {
    for row in rows {
        if row.page.is_empty() && row.paragraph.is_empty() {
            println!("[{}]", row.source_label);
        } else {
            println!(
                "[{}] page {} paragraph {}",
                row.source_label, row.page, row.paragraph
            );
        }
        println!("{}", row.content);
    }
}
