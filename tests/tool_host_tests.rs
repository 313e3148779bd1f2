//! Integration tests for the MCP tool host
//!
//! A minimal in-process HTTP server stands in for an MCP endpoint. It
//! records sessions and terminations so the per-operation session
//! lifecycle can be checked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use toolpilot::tools::OutcomeKind;
use toolpilot::{McpConfig, McpToolHost, ToolExecutor, ToolHost, ToolHostError};

#[derive(Default, Clone, Copy)]
struct ServerOptions {
    /// Answer requests as `text/event-stream`
    sse: bool,
    /// Split the catalog over two `tools/list` pages
    paginate: bool,
}

#[derive(Default)]
struct ServerLog {
    sessions_opened: usize,
    deleted: Vec<String>,
    methods: Vec<String>,
    missing_session_header: usize,
}

struct FakeMcpServer {
    url: String,
    log: Arc<Mutex<ServerLog>>,
}

impl FakeMcpServer {
    async fn start(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(ServerLog::default()));

        let server_log = Arc::clone(&log);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let log = Arc::clone(&server_log);
                tokio::spawn(serve_connection(stream, log, options));
            }
        });

        Self {
            url: format!("http://{}/mcp", addr),
            log,
        }
    }

    fn host(&self) -> McpToolHost {
        McpToolHost::new(McpConfig {
            url: self.url.clone(),
            timeout_secs: 5,
        })
        .unwrap()
    }
}

async fn serve_connection(stream: TcpStream, log: Arc<Mutex<ServerLog>>, options: ServerOptions) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut request_line = String::new();
        match reader.read_line(&mut request_line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let method = request_line.split_whitespace().next().unwrap_or("").to_string();

        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                return;
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let length: usize = headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut body = vec![0u8; length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        let response = respond(&method, &headers, &body, &log, options);
        if reader.get_mut().write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn http_response(status: &str, extra_headers: &[(&str, String)], content_type: &str, body: &str) -> String {
    let mut out = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\n", status, body.len());
    if !content_type.is_empty() {
        out.push_str(&format!("Content-Type: {}\r\n", content_type));
    }
    for (name, value) in extra_headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

fn respond(
    method: &str,
    headers: &HashMap<String, String>,
    body: &[u8],
    log: &Mutex<ServerLog>,
    options: ServerOptions,
) -> String {
    let mut log = log.lock().unwrap();
    let session = headers.get("mcp-session-id").cloned();

    if method == "DELETE" {
        log.deleted.push(session.unwrap_or_default());
        return http_response("200 OK", &[], "", "");
    }

    let message: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let rpc_method = message["method"].as_str().unwrap_or("").to_string();
    log.methods.push(rpc_method.clone());

    let Some(id) = message.get("id").cloned() else {
        // Notification
        return http_response("202 Accepted", &[], "", "");
    };

    let mut extra = Vec::new();
    let reply = match rpc_method.as_str() {
        "initialize" => {
            log.sessions_opened += 1;
            extra.push(("Mcp-Session-Id", format!("session-{}", log.sessions_opened)));
            json!({"jsonrpc": "2.0", "id": id, "result": {
                "protocolVersion": "2025-03-26",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake", "version": "0.0.0"}
            }})
        }
        _ if session.is_none() => {
            log.missing_session_header += 1;
            return http_response("400 Bad Request", &[], "text/plain", "missing session");
        }
        "tools/list" => {
            let search = json!({
                "name": "web_search",
                "description": "Search the web",
                "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
            });
            let python = json!({
                "name": "python_interpreter",
                "description": "Run Python",
                "inputSchema": {"type": "object", "properties": {"code": {"type": "string"}}}
            });
            let cursor = message["params"]["cursor"].as_str();
            let result = match (options.paginate, cursor) {
                (false, _) => json!({"tools": [search, python]}),
                (true, None) => json!({"tools": [search], "nextCursor": "page-2"}),
                (true, Some(_)) => json!({"tools": [python]}),
            };
            json!({"jsonrpc": "2.0", "id": id, "result": result})
        }
        "tools/call" => match message["params"]["name"].as_str() {
            Some("web_search") => {
                let query = message["params"]["arguments"]["query"].as_str().unwrap_or("");
                json!({"jsonrpc": "2.0", "id": id, "result": {
                    "content": [{"type": "text", "text": format!("results for {}", query)}],
                    "structuredContent": {"query": query, "hits": 3},
                    "isError": false
                }})
            }
            Some("flaky") => json!({"jsonrpc": "2.0", "id": id, "result": {
                "content": [{"type": "text", "text": "upstream unavailable"}],
                "isError": true
            }}),
            other => json!({"jsonrpc": "2.0", "id": id, "error": {
                "code": -32602,
                "message": format!("Unknown tool: {}", other.unwrap_or(""))
            }}),
        },
        _ => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "Method not found"}}),
    };

    if options.sse {
        let body = format!("event: message\ndata: {}\n\n", reply);
        http_response("200 OK", &extra, "text/event-stream", &body)
    } else {
        http_response("200 OK", &extra, "application/json", &reply.to_string())
    }
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

/// Each catalog fetch opens and closes its own session
#[tokio::test]
async fn test_list_tools_session_lifecycle() {
    let server = FakeMcpServer::start(ServerOptions::default()).await;
    let host = server.host();

    let first = host.list_tools().await.unwrap();
    let second = host.list_tools().await.unwrap();

    assert_eq!(first, second);
    let names: Vec<&str> = first.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["web_search", "python_interpreter"]);

    let log = server.log.lock().unwrap();
    assert_eq!(log.sessions_opened, 2);
    assert_eq!(log.deleted, vec!["session-1", "session-2"]);
    assert_eq!(log.missing_session_header, 0);
    assert_eq!(
        log.methods,
        vec![
            "initialize",
            "notifications/initialized",
            "tools/list",
            "initialize",
            "notifications/initialized",
            "tools/list"
        ]
    );
}

/// Paginated catalogs are followed to the end
#[tokio::test]
async fn test_list_tools_follows_cursor() {
    let server = FakeMcpServer::start(ServerOptions {
        paginate: true,
        ..ServerOptions::default()
    })
    .await;

    let catalog = server.host().list_tools().await.unwrap();

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[1].name, "python_interpreter");
    assert_eq!(server.log.lock().unwrap().deleted.len(), 1);
}

/// Event-stream responses are understood
#[tokio::test]
async fn test_event_stream_responses() {
    let server = FakeMcpServer::start(ServerOptions {
        sse: true,
        ..ServerOptions::default()
    })
    .await;
    let host = server.host();

    let catalog = host.list_tools().await.unwrap();
    assert_eq!(catalog.len(), 2);

    let result = host
        .call_tool("web_search", args(json!({"query": "rust"})))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.structured_content, Some(json!({"query": "rust", "hits": 3})));
}

/// Calls return the tool's result, and the session is closed afterwards
#[tokio::test]
async fn test_call_tool() {
    let server = FakeMcpServer::start(ServerOptions::default()).await;
    let host = server.host();

    let result = host
        .call_tool("web_search", args(json!({"query": "test"})))
        .await
        .unwrap();

    assert!(!result.is_error);
    assert_eq!(result.content_text(), "results for test");
    assert_eq!(server.log.lock().unwrap().deleted, vec!["session-1"]);
}

/// Server-side errors still close the session
#[tokio::test]
async fn test_jsonrpc_error_closes_session() {
    let server = FakeMcpServer::start(ServerOptions::default()).await;
    let host = server.host();

    let err = host.call_tool("nope", Map::new()).await.unwrap_err();

    assert!(matches!(err, ToolHostError::Protocol(ref msg) if msg.contains("Unknown tool: nope")));
    assert_eq!(server.log.lock().unwrap().deleted, vec!["session-1"]);
}

/// The executor normalizes MCP results and faults
#[tokio::test]
async fn test_executor_over_mcp() {
    let server = FakeMcpServer::start(ServerOptions::default()).await;
    let executor = ToolExecutor::new(Arc::new(server.host()));

    let ok = executor
        .execute("web_search", args(json!({"query": "q"})))
        .await;
    assert_eq!(ok.kind, OutcomeKind::Success);
    assert_eq!(ok.text, r#"{"hits":3,"query":"q"}"#);

    let tool_error = executor.execute("flaky", Map::new()).await;
    assert_eq!(tool_error.kind, OutcomeKind::ToolError);
    assert_eq!(tool_error.text, "upstream unavailable");

    let fault = executor.execute("nope", Map::new()).await;
    assert_eq!(fault.kind, OutcomeKind::TransportFault);
    assert!(fault.is_error());

    assert_eq!(server.log.lock().unwrap().deleted.len(), 3);
}
