//! Document ingestion pipeline.
//!
//! Extraction, persistence, chunking, and indexing for a single source
//! file. Embedding is optional at this stage: with no provider configured
//! the relational hierarchy is still stored and chunks are counted as
//! pending instead of indexed.

use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::error::PipelineError;
use crate::export;
use crate::extract::extract;
use crate::index::VectorIndex;
use crate::models::{ChunkMetadata, Document, DocumentKind};
use crate::ocr::OcrEngine;
use crate::store;

/// Extensions accepted for ingestion, in the order reported to users.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "txt"];

/// Counters describing one completed ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub doc_id: String,
    pub filename: String,
    pub kind: DocumentKind,
    pub pages: usize,
    pub paragraphs: usize,
    pub chunks: usize,
    pub indexed: usize,
    pub pending: usize,
}

/// Resolve the document kind for a path, honoring an explicit override.
pub fn resolve_kind(path: &Path, override_kind: Option<DocumentKind>) -> Result<DocumentKind, PipelineError> {
    if let Some(kind) = override_kind {
        return Ok(kind);
    }
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    DocumentKind::from_filename(&filename).ok_or_else(|| {
        PipelineError::Extraction(format!(
            "unsupported file type: {}. Allowed types: {}",
            filename,
            ALLOWED_EXTENSIONS.join(", ")
        ))
    })
}

/// Run the full pipeline for one file.
pub async fn ingest_document(
    config: &Config,
    pool: &SqlitePool,
    index: &dyn VectorIndex,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    ocr: &dyn OcrEngine,
    path: &Path,
    override_kind: Option<DocumentKind>,
) -> Result<IngestReport, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such file: {}", path.display()),
        )));
    }

    let kind = resolve_kind(path, override_kind)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let doc_id = Uuid::new_v4().to_string();
    let processed_path = config.storage.processed_dir.join(format!("{}.json", doc_id));

    info!(doc_id = %doc_id, file = %path.display(), kind = %kind, "ingesting document");

    let pages = extract(path, kind, ocr)?;

    let doc = Document {
        id: doc_id.clone(),
        filename: filename.clone(),
        kind: kind.as_str().to_string(),
        original_path: path.display().to_string(),
        processed_path: processed_path.display().to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };
    store::insert_document(pool, &doc).await?;

    let mut paragraph_count = 0usize;
    let mut chunk_count = 0usize;
    let mut indexed = 0usize;
    let mut pending = 0usize;

    for (idx, content) in pages.iter().enumerate() {
        let page_number = idx as i64 + 1;
        store::insert_page(pool, &doc_id, page_number, content).await?;
        paragraph_count += store::paragraph_candidates(content).len();

        for (chunk_index, chunk) in split_text(content, config.chunking.max_tokens)
            .into_iter()
            .enumerate()
        {
            chunk_count += 1;
            let metadata = ChunkMetadata {
                doc_id: doc_id.clone(),
                page: page_number,
                chunk_index: chunk_index as i64,
            };

            match &embedder {
                Some(client) => {
                    let vector = client.embed(&chunk).await?;
                    index.upsert(&metadata, &vector, &chunk).await?;
                    indexed += 1;
                }
                None => pending += 1,
            }
        }
    }

    if let Some(artifact) = export::build_export(pool, &doc_id).await? {
        export::write_export(&artifact, &processed_path)?;
    }

    Ok(IngestReport {
        doc_id,
        filename,
        kind,
        pages: pages.len(),
        paragraphs: paragraph_count,
        chunks: chunk_count,
        indexed,
        pending,
    })
}
