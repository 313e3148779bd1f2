//! Single-shot tool selection
//!
//! One model call turns a free-text query and the current catalog into a
//! [`ToolCall`]. Any failure along the way (model fault, unparseable reply,
//! unknown tool) yields the "no decision" sentinel.

use std::sync::Arc;

use tracing::{debug, warn};

use super::decision::parse_selection;
use crate::model::{complete_instrumented, CompletionRequest, ModelClient};
use crate::tools::{catalog_contains, ToolCall, ToolDescriptor};

/// Picks at most one tool for a query
#[derive(Clone)]
pub struct ToolSelector {
    model: Arc<dyn ModelClient>,
    temperature: f32,
    max_tokens: u32,
}

impl ToolSelector {
    pub fn new(model: Arc<dyn ModelClient>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model,
            temperature,
            max_tokens,
        }
    }

    /// Prompt listing the catalog and the reply contract
    pub fn build_prompt(query: &str, catalog: &[ToolDescriptor]) -> String {
        let mut prompt = String::from(
            "You select the single best tool to answer a user request.\n\nAvailable tools:\n",
        );
        for tool in catalog {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            prompt.push_str(&format!("  input schema: {}\n", tool.input_schema));
        }
        prompt.push_str(&format!(
            "\nUser request: {}\n\n\
             Reply with a single JSON object and nothing else. It must have exactly two keys:\n\
             \"tool_name\": the name of one tool from the list, or null if none fits\n\
             \"arguments\": an object with the arguments for that tool\n",
            query
        ));
        prompt
    }

    /// Decide which tool answers `query`; never fails
    pub async fn select(&self, query: &str, catalog: &[ToolDescriptor]) -> ToolCall {
        let request = CompletionRequest::new(
            Self::build_prompt(query, catalog),
            self.temperature,
            self.max_tokens,
        );

        let reply = match complete_instrumented(self.model.as_ref(), request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Tool selection model call failed");
                return ToolCall::none();
            }
        };

        let call = match parse_selection(&reply) {
            Ok(call) => call,
            Err(e) => {
                warn!(error = %e, reply_len = reply.len(), "Unparseable tool selection");
                return ToolCall::none();
            }
        };

        match &call.tool_name {
            Some(name) if !catalog_contains(catalog, name) => {
                warn!(tool = %name, "Selected tool is not in the catalog");
                ToolCall::none()
            }
            Some(name) => {
                debug!(tool = %name, "Tool selected");
                call
            }
            None => {
                debug!("Model declined to select a tool");
                call
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Canned(Result<&'static str, ()>);

    #[async_trait]
    impl ModelClient for Canned {
        fn provider(&self) -> &'static str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, ModelError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(ModelError::EmptyResponse("canned")),
            }
        }
    }

    fn selector(reply: Result<&'static str, ()>) -> ToolSelector {
        ToolSelector::new(Arc::new(Canned(reply)), 0.0, 256)
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "web_search",
            "Search the web",
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        )]
    }

    #[test]
    fn test_prompt_lists_tools_and_contract() {
        let prompt = ToolSelector::build_prompt("find rust news", &catalog());
        assert!(prompt.contains("- web_search: Search the web\n"));
        assert!(prompt.contains("\"tool_name\""));
        assert!(prompt.contains("\"arguments\""));
        assert!(prompt.contains("User request: find rust news"));
    }

    #[tokio::test]
    async fn test_select_fenced_reply() {
        let call = selector(Ok("```json\n{\"tool_name\": \"web_search\", \"arguments\": {\"query\": \"rust\"}}\n```"))
            .select("rust", &catalog())
            .await;
        assert_eq!(call.tool_name.as_deref(), Some("web_search"));
        assert_eq!(call.arguments.get("query"), Some(&json!("rust")));
    }

    #[tokio::test]
    async fn test_select_degrades_to_sentinel() {
        for reply in ["I think web_search", "{\"tool\": \"web_search\"}", "{\"tool_name\": \"other\"}", "[]"] {
            let call = selector(Ok(reply)).select("q", &catalog()).await;
            assert_eq!(call, ToolCall::none(), "reply: {}", reply);
        }

        let call = selector(Err(())).select("q", &catalog()).await;
        assert_eq!(call, ToolCall::none());
    }
}
