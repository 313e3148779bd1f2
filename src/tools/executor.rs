//! Tool execution with uniform outcomes
//!
//! Whatever the tool host does (answers, reports a tool failure, drops the
//! connection, or panics) the executor hands back plain text and a kind.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{info, info_span, warn, Instrument};

use super::host::ToolHost;
use super::types::ToolResult;
use crate::metrics::TOOL_CALLS;

/// How a tool invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Tool ran and succeeded
    Success,
    /// Tool ran and reported `is_error`
    ToolError,
    /// Call never completed: host unreachable, unknown tool, bad arguments
    TransportFault,
    /// Anything else, e.g. a panicking handler
    Unexpected,
}

impl OutcomeKind {
    fn label(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::ToolError => "tool_error",
            OutcomeKind::TransportFault => "transport_error",
            OutcomeKind::Unexpected => "unexpected",
        }
    }
}

/// Normalized result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub kind: OutcomeKind,
    /// Serialized result on success, error description otherwise
    pub text: String,
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        self.kind != OutcomeKind::Success
    }
}

/// Invokes tools on a host and normalizes what comes back
#[derive(Clone)]
pub struct ToolExecutor {
    host: Arc<dyn ToolHost>,
}

impl ToolExecutor {
    pub fn new(host: Arc<dyn ToolHost>) -> Self {
        Self { host }
    }

    /// Call `tool_name` with `arguments`; never fails
    pub async fn execute(&self, tool_name: &str, arguments: Map<String, Value>) -> ToolOutcome {
        let span = info_span!("tool_call", tool = %tool_name, otel.name = "tool_call");
        let start = Instant::now();

        // A separate task contains panics raised by the host or handler
        let host = Arc::clone(&self.host);
        let name = tool_name.to_string();
        let joined = tokio::spawn(
            async move { host.call_tool(&name, arguments).await }.instrument(span.clone()),
        )
        .await;

        let outcome = match joined {
            Ok(Ok(result)) => render_result(&result),
            Ok(Err(e)) => ToolOutcome {
                kind: OutcomeKind::TransportFault,
                text: e.to_string(),
            },
            Err(e) => ToolOutcome {
                kind: OutcomeKind::Unexpected,
                text: format!("tool execution aborted: {}", e),
            },
        };

        TOOL_CALLS
            .with_label_values(&[tool_name, outcome.kind.label()])
            .inc();
        span.in_scope(|| {
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            if outcome.is_error() {
                warn!(status = outcome.kind.label(), duration_ms, error = %outcome.text, "Tool call failed");
            } else {
                info!(duration_ms, result_len = outcome.text.len(), "Tool call succeeded");
            }
        });

        outcome
    }
}

/// Turn a [`ToolResult`] into transcript text
///
/// Errors use the result's content. Successes prefer `structured_content`,
/// serialized with sorted keys when it is an object or array; without it the
/// text content is used.
pub fn render_result(result: &ToolResult) -> ToolOutcome {
    if result.is_error {
        let text = result.content_text();
        return ToolOutcome {
            kind: OutcomeKind::ToolError,
            text: if text.is_empty() {
                "tool reported an error without details".to_string()
            } else {
                text
            },
        };
    }

    let text = match &result.structured_content {
        Some(value @ (Value::Object(_) | Value::Array(_))) => canonical_json(value),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => result.content_text(),
    };

    ToolOutcome {
        kind: OutcomeKind::Success,
        text,
    }
}

/// Compact JSON with object keys in lexicographic order at every depth
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
