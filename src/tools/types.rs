//! Wire types shared by every tool host

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named capability offered by a tool host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique within one catalog snapshot
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the accepted arguments
    #[serde(rename = "inputSchema", alias = "input_schema", default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Whether `name` appears in `catalog`
pub fn catalog_contains(catalog: &[ToolDescriptor], name: &str) -> bool {
    catalog.iter().any(|tool| tool.name == name)
}

/// One item of a tool's unstructured output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    /// Any content type this crate does not interpret
    #[serde(other)]
    Other,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    /// Plain-text rendering suitable for a transcript
    pub fn to_text(&self) -> String {
        match self {
            ContentItem::Text { text } => text.clone(),
            ContentItem::Image { mime_type, .. } => format!("[image: {}]", mime_type),
            ContentItem::Resource { resource } => resource
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| resource.to_string()),
            ContentItem::Other => "[unsupported content]".to_string(),
        }
    }
}

/// Result of calling a tool
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl ToolResult {
    /// Successful result carrying structured output and its JSON text form
    pub fn structured(value: Value) -> Self {
        Self {
            is_error: false,
            content: vec![ContentItem::text(value.to_string())],
            structured_content: Some(value),
        }
    }

    /// Successful result with text content only
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![ContentItem::text(text)],
            structured_content: None,
        }
    }

    /// Application-level failure reported by the tool
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![ContentItem::text(message)],
            structured_content: None,
        }
    }

    /// All content items rendered as text, one per line
    pub fn content_text(&self) -> String {
        self.content
            .iter()
            .map(ContentItem::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A decision to call one tool
///
/// `tool_name == None` is the explicit "no decision" sentinel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolCall {
    pub tool_name: Option<String>,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            arguments,
        }
    }

    /// The "no decision" sentinel
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.tool_name.is_none()
    }
}
