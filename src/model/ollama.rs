//! Ollama client for non-streaming completions

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{status_error, CompletionRequest, ModelClient};
use crate::config::ModelConfig;
use crate::error::ModelError;

const PROVIDER: &str = "ollama";

/// Response body of `/api/generate` with `stream: false`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// The generated text
    #[serde(default)]
    pub response: String,
    /// Number of tokens generated
    #[serde(default)]
    pub eval_count: u32,
    /// Number of tokens in the prompt
    #[serde(default)]
    pub prompt_eval_count: u32,
    /// Time spent generating tokens (nanoseconds)
    #[serde(default, rename = "eval_duration")]
    pub eval_duration_ns: u64,
}

/// Client for Ollama's HTTP API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    /// * `model` - The model name (e.g., "qwen3")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client honoring the configured request timeout
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    /// Generate a complete response along with token/timing metadata
    pub async fn generate(&self, request: &CompletionRequest) -> Result<GenerateResponse, ModelError> {
        let endpoint = format!("{}/api/generate", self.base_url);

        let resp = self
            .client
            .post(&endpoint)
            .json(&json!({
                "model": self.model,
                "prompt": request.prompt,
                "stream": false,
                "options": {
                    "temperature": request.temperature,
                    "num_predict": request.max_tokens
                }
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(status_error(PROVIDER, resp).await);
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let generated = self.generate(&request).await?;
        tracing::debug!(
            eval_count = generated.eval_count,
            prompt_eval_count = generated.prompt_eval_count,
            eval_duration_ms = generated.eval_duration_ns / 1_000_000,
            "Ollama generation stats"
        );
        Ok(generated.response)
    }
}
