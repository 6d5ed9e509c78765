//! Vector index over chunk embeddings.
//!
//! The SQLite implementation stores embeddings as little-endian f32 BLOBs
//! and scores candidates in Rust with cosine similarity. Corpora here are
//! small enough that a full scan per query is fine.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::PipelineError;
use crate::models::{ChunkMetadata, RetrievedChunk};

/// Stores chunk vectors and answers nearest-neighbor queries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the entry for `metadata.key()`.
    async fn upsert(
        &self,
        metadata: &ChunkMetadata,
        vector: &[f32],
        text: &str,
    ) -> Result<(), PipelineError>;

    /// Return the `k` nearest chunks, ascending by distance (1 - cosine).
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, PipelineError>;

    /// Remove every entry belonging to a document.
    async fn delete_document(&self, doc_id: &str) -> Result<(), PipelineError>;

    /// Remove all entries.
    async fn clear(&self) -> Result<(), PipelineError>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize, PipelineError>;
}

/// SQLite-backed index over the `chunk_vectors` table.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(
        &self,
        metadata: &ChunkMetadata,
        vector: &[f32],
        text: &str,
    ) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (key, document_id, page_number, chunk_index, text, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                document_id = excluded.document_id,
                page_number = excluded.page_number,
                chunk_index = excluded.chunk_index,
                text = excluded.text,
                embedding = excluded.embedding
            "#,
        )
        .bind(metadata.key())
        .bind(&metadata.doc_id)
        .bind(metadata.page)
        .bind(metadata.chunk_index)
        .bind(text)
        .bind(vec_to_blob(vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, PipelineError> {
        let rows =
            sqlx::query("SELECT document_id, page_number, chunk_index, text, embedding FROM chunk_vectors")
                .fetch_all(&self.pool)
                .await?;

        let mut scored: Vec<RetrievedChunk> = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let candidate = blob_to_vec(&blob);
                RetrievedChunk {
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        doc_id: row.get("document_id"),
                        page: row.get("page_number"),
                        chunk_index: row.get("chunk_index"),
                    },
                    distance: 1.0 - cosine_similarity(vector, &candidate),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<(), PipelineError> {
        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), PipelineError> {
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize, PipelineError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }
}

/// In-memory index for tests and offline pipelines.
pub struct MemoryIndex {
    entries: std::sync::Mutex<std::collections::HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    metadata: ChunkMetadata,
    vector: Vec<f32>,
    text: String,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn lock(
        &self,
    ) -> Result<
        std::sync::MutexGuard<'_, std::collections::HashMap<String, MemoryEntry>>,
        PipelineError,
    > {
        self.entries
            .lock()
            .map_err(|_| PipelineError::Indexing("memory index poisoned".to_string()))
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(
        &self,
        metadata: &ChunkMetadata,
        vector: &[f32],
        text: &str,
    ) -> Result<(), PipelineError> {
        self.lock()?.insert(
            metadata.key(),
            MemoryEntry {
                metadata: metadata.clone(),
                vector: vector.to_vec(),
                text: text.to_string(),
            },
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, PipelineError> {
        let mut scored: Vec<RetrievedChunk> = self
            .lock()?
            .values()
            .map(|e| RetrievedChunk {
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                distance: 1.0 - cosine_similarity(vector, &e.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<(), PipelineError> {
        self.lock()?.retain(|_, e| e.metadata.doc_id != doc_id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PipelineError> {
        self.lock()?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize, PipelineError> {
        Ok(self.lock()?.len())
    }
}
