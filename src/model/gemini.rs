//! Gemini client for the `generateContent` REST endpoint

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{status_error, CompletionRequest, ModelClient};
use crate::config::ModelConfig;
use crate::error::ModelError;

const PROVIDER: &str = "gemini";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, concatenated
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Client for the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Fails with [`ModelError::MissingApiKey`] when no key is configured
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ModelError::MissingApiKey(PROVIDER))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
                "generationConfig": {
                    "temperature": request.temperature,
                    "maxOutputTokens": request.max_tokens
                }
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(status_error(PROVIDER, resp).await);
        }

        let body = resp.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        parsed.into_text().ok_or(ModelError::EmptyResponse(PROVIDER))
    }
}
