//! Question-time retrieval.

use std::sync::Arc;

use crate::embedding::EmbeddingClient;
use crate::error::PipelineError;
use crate::index::VectorIndex;
use crate::models::RetrievedChunk;

/// Embed a question and return the `k` nearest chunks, nearest first.
pub async fn retrieve_chunks(
    embedder: &Arc<dyn EmbeddingClient>,
    index: &dyn VectorIndex,
    question: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>, PipelineError> {
    let vector = embedder
        .embed(question)
        .await
        .map_err(|e| PipelineError::Retrieval(e.to_string()))?;

    index
        .query(&vector, k)
        .await
        .map_err(|e| PipelineError::Retrieval(e.to_string()))
}
