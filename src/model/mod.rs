//! Text-completion clients
//!
//! The agent only needs "prompt in, text out". Each provider adapter turns a
//! [`CompletionRequest`] into its own HTTP call and returns the raw reply;
//! no parsing of the reply happens here.

pub mod gemini;
pub mod ollama;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::{ModelConfig, ModelProvider};
use crate::error::ModelError;
use crate::metrics::{MODEL_CALLS, MODEL_CALL_DURATION};

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens,
        }
    }
}

/// A text-completion backend
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short provider label used in logs and metrics
    fn provider(&self) -> &'static str;

    /// Model name requests are sent to
    fn model(&self) -> &str;

    /// Complete `request.prompt` and return the reply text unmodified
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;
}

/// Build the client selected by `config.provider`
pub fn build_client(config: &ModelConfig) -> Result<Arc<dyn ModelClient>, ModelError> {
    let client: Arc<dyn ModelClient> = match config.provider {
        ModelProvider::Ollama => Arc::new(OllamaClient::from_config(config)?),
        ModelProvider::Gemini => Arc::new(GeminiClient::from_config(config)?),
    };
    Ok(client)
}

/// [`ModelClient::complete`] with a span, duration histogram and call counter
pub async fn complete_instrumented(
    client: &dyn ModelClient,
    request: CompletionRequest,
) -> Result<String, ModelError> {
    let provider = client.provider();
    let span = info_span!(
        "model_call",
        provider,
        model = %client.model(),
        prompt_len = request.prompt.len(),
        otel.name = "model_call"
    );

    async {
        let start = Instant::now();
        let result = client.complete(request).await;
        let elapsed = start.elapsed().as_secs_f64();

        MODEL_CALL_DURATION
            .with_label_values(&[provider])
            .observe(elapsed);
        match &result {
            Ok(text) => {
                MODEL_CALLS.with_label_values(&[provider, "ok"]).inc();
                debug!(duration_ms = elapsed * 1000.0, reply_len = text.len(), "Model call completed");
            }
            Err(e) => {
                MODEL_CALLS.with_label_values(&[provider, "error"]).inc();
                warn!(duration_ms = elapsed * 1000.0, error = %e, "Model call failed");
            }
        }
        result
    }
    .instrument(span)
    .await
}

/// Read an error response body for inclusion in [`ModelError::Status`]
pub(crate) async fn status_error(provider: &'static str, resp: reqwest::Response) -> ModelError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ModelError::Status {
        provider,
        status,
        body: body.trim().to_string(),
    }
}
