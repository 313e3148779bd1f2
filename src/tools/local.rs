//! In-process tool host
//!
//! A registry of validated handlers keyed by name. Each handler declares the
//! JSON Schema of its arguments; the schema is compiled when the handler is
//! registered and every call is checked against it before dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::host::ToolHost;
use super::types::{ToolDescriptor, ToolResult};
use crate::error::ToolHostError;

/// A tool implemented inside this process
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name, description and argument schema
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with arguments that already passed schema validation
    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolHostError>;
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    validator: jsonschema::Validator,
    handler: Arc<dyn ToolHandler>,
}

/// Tool host backed by in-process handlers
#[derive(Default)]
pub struct LocalToolHost {
    /// Registration order is catalog order
    tools: Vec<RegisteredTool>,
}

impl std::fmt::Debug for LocalToolHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalToolHost")
            .field("tools", &self.names())
            .finish()
    }
}

impl LocalToolHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    ///
    /// Fails if the name is empty or taken, or if the declared input schema is
    /// not a valid JSON Schema describing an object.
    pub fn register(&mut self, handler: impl ToolHandler + 'static) -> Result<(), ToolHostError> {
        let descriptor = handler.descriptor();
        let reject = |reason: String| ToolHostError::Registration {
            tool: descriptor.name.clone(),
            reason,
        };

        if descriptor.name.trim().is_empty() {
            return Err(reject("tool name must not be empty".to_string()));
        }
        if self.get(&descriptor.name).is_some() {
            return Err(reject("a tool with this name is already registered".to_string()));
        }
        if descriptor.input_schema.get("type").and_then(Value::as_str) != Some("object") {
            return Err(reject("input schema must describe an object".to_string()));
        }

        let validator = jsonschema::validator_for(&descriptor.input_schema)
            .map_err(|e| reject(format!("invalid input schema: {}", e)))?;

        debug!(tool = %descriptor.name, "Registered local tool");
        self.tools.push(RegisteredTool {
            descriptor,
            validator,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_tool(mut self, handler: impl ToolHandler + 'static) -> Result<Self, ToolHostError> {
        self.register(handler)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.descriptor.name == name)
    }
}

#[async_trait]
impl ToolHost for LocalToolHost {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolHostError> {
        Ok(self.tools.iter().map(|t| t.descriptor.clone()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolHostError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolHostError::UnknownTool(name.to_string()))?;

        let instance = Value::Object(arguments.clone());
        let problems: Vec<String> = tool
            .validator
            .iter_errors(&instance)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        if !problems.is_empty() {
            return Err(ToolHostError::InvalidArguments {
                tool: name.to_string(),
                reason: problems.join("; "),
            });
        }

        tool.handler.call(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo {
        name: &'static str,
        schema: Value,
    }

    #[async_trait]
    impl ToolHandler for Echo {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new(self.name, "Echo the arguments back", self.schema.clone())
        }

        async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolHostError> {
            Ok(ToolResult::structured(Value::Object(arguments)))
        }
    }

    fn echo(name: &'static str) -> Echo {
        Echo {
            name,
            schema: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut host = LocalToolHost::new();
        host.register(echo("echo")).unwrap();
        let err = host.register(echo("echo")).unwrap_err();
        assert!(matches!(err, ToolHostError::Registration { .. }));
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn test_register_rejects_non_object_schema() {
        let mut host = LocalToolHost::new();
        let err = host
            .register(Echo {
                name: "bad",
                schema: json!({"type": "string"}),
            })
            .unwrap_err();
        assert!(err.to_string().contains("must describe an object"));
    }

    #[test]
    fn test_register_rejects_invalid_schema() {
        let mut host = LocalToolHost::new();
        let err = host
            .register(Echo {
                name: "bad",
                schema: json!({"type": "object", "properties": {"q": {"type": 42}}}),
            })
            .unwrap_err();
        assert!(err.to_string().contains("invalid input schema"));
        assert!(host.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_is_stable_and_ordered() {
        let host = LocalToolHost::new()
            .with_tool(echo("b_tool"))
            .unwrap()
            .with_tool(echo("a_tool"))
            .unwrap();

        let first = host.list_tools().await.unwrap();
        let second = host.list_tools().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].name, "b_tool");
        assert_eq!(first[1].name, "a_tool");
    }

    #[tokio::test]
    async fn test_call_validates_arguments() {
        let host = LocalToolHost::new().with_tool(echo("echo")).unwrap();

        let ok = host
            .call_tool("echo", args(json!({"query": "test"})))
            .await
            .unwrap();
        assert_eq!(ok.structured_content, Some(json!({"query": "test"})));

        let missing = host.call_tool("echo", Map::new()).await.unwrap_err();
        assert!(matches!(missing, ToolHostError::InvalidArguments { .. }));

        let wrong_type = host
            .call_tool("echo", args(json!({"query": 7})))
            .await
            .unwrap_err();
        assert!(matches!(wrong_type, ToolHostError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let host = LocalToolHost::new();
        let err = host.call_tool("nope", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolHostError::UnknownTool(name) if name == "nope"));
    }
}
