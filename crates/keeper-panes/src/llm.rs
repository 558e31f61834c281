//! Text-completion seam for the pane workers.
//!
//! The workers only ever need "prompt in, text out"; streaming, chat
//! history, and provider selection all live behind the
//! [`CompletionClient`] trait. [`OllamaClient`] is the bundled local
//! provider; anything OpenAI-shaped can be added behind the same seam.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Default Ollama API URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default model for pane classification and summarization.
pub const DEFAULT_OLLAMA_MODEL: &str = "gpt-oss:20b";

/// Per-request deadline for completions.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Single-shot text completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete `prompt` and return the response text, trimmed.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Local Ollama provider using the non-streaming `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Create a client for the given base URL and model.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL)
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?
            .error_for_status()?;
        let payload: GenerateResponse = response.json().await?;
        debug!(model = %self.model, chars = payload.response.len(), "completion received");
        Ok(payload.response.trim().to_string())
    }
}
