//! Generative model client for answer and theme synthesis.
//!
//! Unlike embeddings, generation calls are not retried: prompts are large
//! and the caller surfaces failures directly to the user.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerativeConfig;
use crate::error::PipelineError;

/// Produces free-form text from a prompt.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

pub fn create_generative_client(
    config: &GenerativeConfig,
) -> Result<Arc<dyn GenerativeClient>, PipelineError> {
    let model = config.model.clone().unwrap_or_default();
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerativeClient::new(
            model,
            config.timeout_secs,
        ))),
        other => Err(PipelineError::Synthesis(format!(
            "generative provider '{}' is not available",
            other
        ))),
    }
}

/// Gemini `generateContent` API client.
pub struct GeminiGenerativeClient {
    client: reqwest::Client,
    model: String,
}

impl GeminiGenerativeClient {
    pub fn new(model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            model,
        }
    }
}

#[async_trait]
impl GenerativeClient for GeminiGenerativeClient {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            PipelineError::Synthesis("GEMINI_API_KEY environment variable not set".to_string())
        })?;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, key
        );
        let body = serde_json::json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ]
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("gemini generate: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Synthesis(format!(
                "gemini generate failed ({}): {}",
                status, text
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("gemini response: {}", e)))?;

        extract_text(&v)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(v: &Value) -> Result<String, PipelineError> {
    let parts = v["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            PipelineError::Synthesis("gemini response has no candidates".to_string())
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    Ok(text)
}
