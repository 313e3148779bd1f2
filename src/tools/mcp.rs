//! Remote tool host speaking MCP over streamable HTTP
//!
//! Every operation runs in its own session:
//!
//! ```text
//!   POST initialize ──► POST notifications/initialized ──► POST tools/… ──► DELETE
//!        │                       │                            │              ▲
//!        └── Mcp-Session-Id ─────┴────────────────────────────┴──────────────┘
//! ```
//!
//! The DELETE is sent on every exit path once a session id has been issued.
//! Responses may be plain JSON or a `text/event-stream` body carrying the
//! JSON-RPC message in `data:` lines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use tracing::{debug, info_span, warn, Instrument};

use super::host::ToolHost;
use super::types::{ToolDescriptor, ToolResult};
use crate::config::McpConfig;
use crate::error::ToolHostError;

const SESSION_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const PROTOCOL_VERSION: &str = "2025-03-26";

/// Upper bound on `tools/list` pages followed for one catalog fetch
const MAX_LIST_PAGES: usize = 64;

/// Handle to one open MCP session
#[derive(Debug, Default)]
struct Session {
    id: Option<String>,
}

/// Tool host reached through an MCP server's HTTP endpoint
#[derive(Debug)]
pub struct McpToolHost {
    config: McpConfig,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl McpToolHost {
    /// Create a host for the endpoint in `config`
    ///
    /// No connection is made until the first operation.
    pub fn new(config: McpConfig) -> Result<Self, ToolHostError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Run `initialize` and the `initialized` notification
    async fn open_session(&self) -> Result<Session, ToolHostError> {
        let mut session = Session::default();
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let init = self.request(&mut session, "initialize", params).await;
        let handshake = match init {
            Ok(_) => self.notify(&session, "notifications/initialized").await,
            Err(e) => Err(e),
        };

        match handshake {
            Ok(()) => {
                debug!(session_id = ?session.id, "MCP session opened");
                Ok(session)
            }
            Err(e) => {
                self.close_session(session).await;
                Err(e)
            }
        }
    }

    /// Terminate the session on the server, best effort
    async fn close_session(&self, session: Session) {
        let Some(id) = session.id else {
            return;
        };
        match self
            .client
            .delete(&self.config.url)
            .header(SESSION_HEADER, &id)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION)
            .send()
            .await
        {
            Ok(resp) => debug!(session_id = %id, status = resp.status().as_u16(), "MCP session closed"),
            Err(e) => warn!(session_id = %id, error = %e, "Failed to close MCP session"),
        }
    }

    /// Send a JSON-RPC request and return its `result`
    ///
    /// Records the session id if the server issues one.
    async fn request(
        &self,
        session: &mut Session,
        method: &str,
        params: Value,
    ) -> Result<Value, ToolHostError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let resp = self.post(session, &body).send().await?;
        if let Some(issued) = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            session.id = Some(issued.to_string());
        }

        let status = resp.status();
        let is_event_stream = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ToolHostError::Transport(format!(
                "{} returned HTTP {} for {}: {}",
                self.config.url,
                status.as_u16(),
                method,
                text.trim()
            )));
        }

        let message = if is_event_stream {
            extract_sse_message(&text, id)?
        } else {
            serde_json::from_str(&text)?
        };
        unwrap_response(message)
    }

    async fn notify(&self, session: &Session, method: &str) -> Result<(), ToolHostError> {
        let body = json!({"jsonrpc": "2.0", "method": method});
        let resp = self.post(session, &body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolHostError::Transport(format!(
                "{} returned HTTP {} for {}",
                self.config.url,
                status.as_u16(),
                method
            )));
        }
        Ok(())
    }

    fn post(&self, session: &Session, body: &Value) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.config.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(id) = &session.id {
            builder = builder
                .header(SESSION_HEADER, id)
                .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION);
        }
        builder
    }

    async fn list_all(&self, session: &mut Session) -> Result<Vec<ToolDescriptor>, ToolHostError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.request(session, "tools/list", params).await?;

            let page: Vec<ToolDescriptor> = match result.get("tools") {
                Some(list) => serde_json::from_value(list.clone())?,
                None => {
                    return Err(ToolHostError::Protocol(
                        "tools/list result has no `tools` field".to_string(),
                    ))
                }
            };
            tools.extend(page);

            match result.get("nextCursor").and_then(Value::as_str) {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next) => {
                    cursor = Some(next.to_string());
                }
                _ => return Ok(tools),
            }
        }

        warn!(pages = MAX_LIST_PAGES, "tools/list pagination limit reached");
        Ok(tools)
    }
}

#[async_trait]
impl ToolHost for McpToolHost {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolHostError> {
        let span = info_span!("mcp_list_tools", url = %self.config.url);
        async {
            let mut session = self.open_session().await?;
            let result = self.list_all(&mut session).await;
            self.close_session(session).await;
            result
        }
        .instrument(span)
        .await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolHostError> {
        let span = info_span!("mcp_call_tool", url = %self.config.url, tool = %name);
        async {
            let mut session = self.open_session().await?;
            let params = json!({"name": name, "arguments": arguments});
            let result = self
                .request(&mut session, "tools/call", params)
                .await
                .and_then(|value| serde_json::from_value::<ToolResult>(value).map_err(Into::into));
            self.close_session(session).await;
            result
        }
        .instrument(span)
        .await
    }
}

/// Pick the JSON-RPC response for request `id` out of an SSE body
fn extract_sse_message(body: &str, id: u64) -> Result<Value, ToolHostError> {
    let mut data = String::new();
    let mut fallback = None;

    // A trailing blank line ends the last event
    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.is_empty() && !data.is_empty() {
            let event = std::mem::take(&mut data);
            let Ok(message) = serde_json::from_str::<Value>(&event) else {
                continue;
            };
            if message.get("id").and_then(Value::as_u64) == Some(id) {
                return Ok(message);
            }
            if fallback.is_none() && (message.get("result").is_some() || message.get("error").is_some()) {
                fallback = Some(message);
            }
        }
    }

    fallback.ok_or_else(|| ToolHostError::Protocol("event stream carried no JSON-RPC response".to_string()))
}

/// Split a JSON-RPC response into its result or error
fn unwrap_response(message: Value) -> Result<Value, ToolHostError> {
    if let Some(error) = message.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let text = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified error");
        return Err(ToolHostError::Protocol(format!("JSON-RPC error {}: {}", code, text)));
    }
    match message {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| ToolHostError::Protocol("response has neither result nor error".to_string())),
        _ => Err(ToolHostError::Protocol("response is not a JSON object".to_string())),
    }
}
