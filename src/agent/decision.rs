//! Parsing untrusted model replies into tool decisions
//!
//! Model output is free text that may or may not contain a JSON decision.
//! Nothing here panics or propagates a parse failure past the caller: every
//! reply maps to exactly one [`ReplyKind`] or [`ToolCall`].

use serde_json::{Map, Value};
use thiserror::Error;

use crate::tools::{catalog_contains, ToolCall, ToolDescriptor};

/// Why a reply could not be turned into a decision
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("reply is not valid JSON: {0}")]
    Json(String),

    #[error("reply is not a JSON object")]
    NotAnObject,

    #[error("missing key `{0}`")]
    MissingKey(&'static str),

    #[error("`{0}` has the wrong type")]
    WrongType(&'static str),
}

/// What a conversational reply turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind {
    /// Plain answer; no tool was requested
    Prose,
    /// Well-formed request for a tool in the catalog
    ToolCall(ToolCall),
    /// Looked like a tool request but could not be honored
    Malformed(String),
}

/// Remove a surrounding Markdown code fence, if present
///
/// Handles ```` ```json ```` and bare ```` ``` ```` fences; anything else is
/// returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Classify a conversational reply against the request's catalog
///
/// Accepts `tool_name` or `name` for the tool, `parameters` or `arguments`
/// for its arguments. A reply that does not start with `{` is prose.
pub fn classify_reply(reply: &str, catalog: &[ToolDescriptor]) -> ReplyKind {
    let body = strip_code_fence(reply);
    if !body.starts_with('{') {
        return ReplyKind::Prose;
    }

    let object = match parse_object(body) {
        Ok(object) => object,
        Err(e) => return ReplyKind::Malformed(e.to_string()),
    };

    let name = match object.get("tool_name").or_else(|| object.get("name")) {
        Some(Value::String(name)) => name.clone(),
        Some(_) => return ReplyKind::Malformed(DecisionError::WrongType("tool_name").to_string()),
        None => return ReplyKind::Malformed(DecisionError::MissingKey("tool_name").to_string()),
    };
    let arguments = match object.get("parameters").or_else(|| object.get("arguments")) {
        Some(Value::Object(args)) => args.clone(),
        Some(_) => return ReplyKind::Malformed(DecisionError::WrongType("parameters").to_string()),
        None => return ReplyKind::Malformed(DecisionError::MissingKey("parameters").to_string()),
    };

    if !catalog_contains(catalog, &name) {
        return ReplyKind::Malformed(format!("tool '{}' is not in the catalog", name));
    }
    ReplyKind::ToolCall(ToolCall::new(name, arguments))
}

/// Parse a selector reply of the form `{"tool_name": ..., "arguments": {...}}`
///
/// `tool_name` must be present and be a string or null; `arguments` may be
/// absent or null (both mean `{}`) but otherwise must be an object. Extra
/// keys are ignored.
pub fn parse_selection(reply: &str) -> Result<ToolCall, DecisionError> {
    let object = parse_object(strip_code_fence(reply))?;

    let tool_name = match object.get("tool_name") {
        Some(Value::String(name)) => Some(name.clone()),
        Some(Value::Null) => None,
        Some(_) => return Err(DecisionError::WrongType("tool_name")),
        None => return Err(DecisionError::MissingKey("tool_name")),
    };
    let arguments = match object.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => return Err(DecisionError::WrongType("arguments")),
    };

    Ok(ToolCall {
        tool_name,
        arguments,
    })
}

fn parse_object(text: &str) -> Result<Map<String, Value>, DecisionError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecisionError::NotAnObject),
        Err(e) => Err(DecisionError::Json(e.to_string())),
    }
}
