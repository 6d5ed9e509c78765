//! Embedding providers and vector helpers.
//!
//! Chunks and questions are embedded through a remote provider (Gemini or
//! OpenAI). Transient HTTP failures (429 and 5xx) are retried with
//! exponential backoff; everything else fails fast.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

/// Build the configured embedding client, or an error when the provider is
/// `disabled` (callers decide whether that is fatal).
pub fn create_embedding_client(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingClient>, PipelineError> {
    let model = config.model.clone().unwrap_or_default();
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiEmbeddingClient::new(
            model,
            config.max_retries,
            config.timeout_secs,
        ))),
        "openai" => Ok(Arc::new(OpenAiEmbeddingClient::new(
            model,
            config.max_retries,
            config.timeout_secs,
        ))),
        other => Err(PipelineError::Indexing(format!(
            "embedding provider '{}' is not available",
            other
        ))),
    }
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

fn api_key(var: &str) -> Result<String, PipelineError> {
    std::env::var(var)
        .map_err(|_| PipelineError::Indexing(format!("{} environment variable not set", var)))
}

/// Gemini `embedContent` API client.
pub struct GeminiEmbeddingClient {
    client: reqwest::Client,
    model: String,
    max_retries: u32,
}

impl GeminiEmbeddingClient {
    pub fn new(model: String, max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            model,
            max_retries,
        }
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let key = api_key("GEMINI_API_KEY")?;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:embedContent?key={}",
            self.model, key
        );
        let body = serde_json::json!({
            "content": { "parts": [ { "text": text } ] }
        });

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let resp = self.client.post(&url).json(&body).send().await;

            match resp {
                Ok(r) if r.status().is_success() => {
                    let v: Value = r
                        .json()
                        .await
                        .map_err(|e| PipelineError::Indexing(format!("gemini response: {}", e)))?;
                    return parse_values(&v["embedding"]["values"]);
                }
                Ok(r) if is_retryable(r.status()) && attempt <= self.max_retries => {
                    warn!(status = %r.status(), attempt, "gemini embed retrying");
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    return Err(PipelineError::Indexing(format!(
                        "gemini embed failed ({}): {}",
                        status, text
                    )));
                }
                Err(e) if attempt <= self.max_retries => {
                    warn!(attempt, "gemini embed request error, retrying: {}", e);
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                Err(e) => {
                    return Err(PipelineError::Indexing(format!("gemini embed: {}", e)));
                }
            }
        }
    }
}

/// OpenAI `/v1/embeddings` API client.
pub struct OpenAiEmbeddingClient {
    client: reqwest::Client,
    model: String,
    max_retries: u32,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: String, max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            model,
            max_retries,
        }
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let key = api_key("OPENAI_API_KEY")?;
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(r) if r.status().is_success() => {
                    let v: Value = r
                        .json()
                        .await
                        .map_err(|e| PipelineError::Indexing(format!("openai response: {}", e)))?;
                    return parse_values(&v["data"][0]["embedding"]);
                }
                Ok(r) if is_retryable(r.status()) && attempt <= self.max_retries => {
                    warn!(status = %r.status(), attempt, "openai embed retrying");
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    return Err(PipelineError::Indexing(format!(
                        "openai embed failed ({}): {}",
                        status, text
                    )));
                }
                Err(e) if attempt <= self.max_retries => {
                    warn!(attempt, "openai embed request error, retrying: {}", e);
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                Err(e) => {
                    return Err(PipelineError::Indexing(format!("openai embed: {}", e)));
                }
            }
        }
    }
}

fn parse_values(values: &Value) -> Result<Vec<f32>, PipelineError> {
    let arr = values
        .as_array()
        .ok_or_else(|| PipelineError::Indexing("missing embedding values".to_string()))?;
    arr.iter()
        .map(|x| {
            x.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| PipelineError::Indexing("non-numeric embedding value".to_string()))
        })
        .collect()
}

/// Serialize a vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(v.len() * 4);
    for x in v {
        blob.extend_from_slice(&x.to_le_bytes());
    }
    blob
}

/// Inverse of [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        na += (*x as f64) * (*x as f64);
        nb += (*y as f64) * (*y as f64);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
