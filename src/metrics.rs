//! Prometheus metrics for agent requests, model calls, tool calls and sandbox runs
//!
//! All metrics live in the default Prometheus registry and are registered
//! lazily on first use.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Agent requests by operating mode and outcome.
    ///
    /// Labels:
    /// - mode: "conversation" (free-text loop) or "routed" (single-shot selection)
    /// - outcome: "answered", "tool_result", "tool_error", "no_tool", "degraded"
    pub static ref AGENT_REQUESTS: CounterVec = register_counter_vec!(
        "toolpilot_agent_requests_total",
        "Agent requests by mode and outcome",
        &["mode", "outcome"]
    ).expect("failed to register AGENT_REQUESTS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Model Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Completion calls by provider and status ("ok" / "error").
    pub static ref MODEL_CALLS: CounterVec = register_counter_vec!(
        "toolpilot_model_calls_total",
        "Text-completion calls by provider and status",
        &["provider", "status"]
    ).expect("failed to register MODEL_CALLS metric");

    /// Wall-clock duration of completion calls.
    pub static ref MODEL_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "toolpilot_model_call_duration_seconds",
        "Duration of text-completion calls",
        &["provider"]
    ).expect("failed to register MODEL_CALL_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Tool Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Tool invocations by tool name and status.
    ///
    /// Labels:
    /// - tool: tool name as it appears in the catalog
    /// - status: "success", "tool_error", "transport_error", "unexpected"
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "toolpilot_tool_calls_total",
        "Tool invocations by tool and status",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Sandbox Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Sandboxed executions by status ("success", "error", "timeout", "fault").
    pub static ref SANDBOX_EXECUTIONS: CounterVec = register_counter_vec!(
        "toolpilot_sandbox_executions_total",
        "Sandboxed code executions by status",
        &["status"]
    ).expect("failed to register SANDBOX_EXECUTIONS metric");

    /// Wall-clock duration of sandboxed executions, including spawn and teardown.
    pub static ref SANDBOX_DURATION: Histogram = register_histogram!(
        "toolpilot_sandbox_duration_seconds",
        "Duration of sandboxed code executions"
    ).expect("failed to register SANDBOX_DURATION metric");
}

/// Render every registered metric in the Prometheus text exposition format
pub fn encode_text() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
