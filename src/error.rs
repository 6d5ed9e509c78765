//! Pipeline error taxonomy.
//!
//! Errors are grouped by the pipeline stage that produced them so callers can
//! distinguish "the document could not be read" from "the model call failed".
//! Parsing of model output never produces an error; malformed responses
//! degrade to fewer rows.

use thiserror::Error;

/// Errors surfaced by the ingestion and answering pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// OCR, PDF, or image decode failure. Not retried.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Unreadable or undecodable source/derived file. Not retried.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding or vector-index call failure during ingestion. Relational
    /// rows may already exist without matching vector entries.
    #[error("indexing failed: {0}")]
    Indexing(String),

    /// Vector-index query failure at answer time.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Generative-model call failure. No automatic retry, no fallback answer.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// Relational store failure.
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
