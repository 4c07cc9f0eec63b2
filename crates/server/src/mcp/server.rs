//! JSON-RPC 2.0 server over stdio.
//!
//! One request per line on stdin, one response per line on stdout. Logs go
//! to stderr so they never interleave with protocol output.

use super::dispatch::McpMethod;
use super::tools::{ToolRegistry, ToolResult};
use lance_mcp_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info_span, Instrument};

/// MCP protocol version advertised on initialize.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name advertised on initialize.
pub const SERVER_NAME: &str = "lance-mcp";

/// Result type for method dispatch.
type DispatchResult = std::result::Result<Value, (i32, String)>;

/// MCP server exposing the vector tools.
pub struct McpServer {
    tools: ToolRegistry,
}

impl McpServer {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    /// Serve requests from stdin until it closes.
    pub async fn run_stdio(&self) -> AppResult<()> {
        tracing::info!("MCP server listening on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await?;
        tracing::info!("stdin closed, stopping MCP server");
        Ok(())
    }

    /// Serve newline-delimited requests from `reader`, answering on `writer`.
    ///
    /// A line that is not valid UTF-8 gets a parse error and the loop goes on;
    /// only I/O failures on the streams end it.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(());
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_request(line.trim()).await,
                Err(e) => {
                    tracing::warn!("Request is not valid UTF-8: {}", e);
                    Some(format_error(Value::Null, -32700, &format!("Parse error: {e}")))
                }
            };

            if let Some(response) = response {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
    }

    /// Handles one JSON-RPC message.
    ///
    /// Returns `None` for notifications, which get no response.
    pub async fn handle_request(&self, request: &str) -> Option<String> {
        let span = info_span!(
            "mcp.request",
            rpc.method = tracing::field::Empty,
            rpc.id = tracing::field::Empty,
            status = tracing::field::Empty
        );

        async {
            let value: Value = match serde_json::from_str(request) {
                Ok(value) => value,
                Err(e) => {
                    tracing::Span::current().record("status", "parse_error");
                    tracing::warn!("Failed to parse request: {}", e);
                    return Some(format_error(Value::Null, -32700, &format!("Parse error: {e}")));
                }
            };

            let raw_id = value.get("id").cloned().unwrap_or(Value::Null);
            let req = match serde_json::from_value::<JsonRpcRequest>(value) {
                Ok(req) if req.jsonrpc == "2.0" => req,
                Ok(req) => {
                    tracing::Span::current().record("status", "invalid_request");
                    return Some(format_error(
                        raw_id,
                        -32600,
                        &format!("Invalid Request: unsupported jsonrpc version '{}'", req.jsonrpc),
                    ));
                }
                Err(e) => {
                    tracing::Span::current().record("status", "invalid_request");
                    tracing::warn!("Invalid request: {}", e);
                    return Some(format_error(raw_id, -32600, &format!("Invalid Request: {e}")));
                }
            };

            let current = tracing::Span::current();
            current.record("rpc.method", req.method.as_str());
            if let Some(id) = &req.id {
                current.record("rpc.id", id.to_string().as_str());
            }
            tracing::debug!(method = %req.method, "Processing MCP request");

            let result = self.dispatch_method(&req.method, req.params).await;
            current.record("status", if result.is_ok() { "success" } else { "error" });

            match req.id {
                Some(id) => Some(format_response(id, result)),
                None => {
                    tracing::debug!(method = %req.method, "Notification handled");
                    None
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch_method(&self, method: &str, params: Option<Value>) -> DispatchResult {
        match McpMethod::from(method) {
            McpMethod::Initialize => Ok(self.handle_initialize()),
            McpMethod::Initialized => Ok(Value::Null),
            McpMethod::ListTools => Ok(self.handle_list_tools()),
            McpMethod::CallTool => self.handle_call_tool(params).await,
            McpMethod::Ping => Ok(serde_json::json!({})),
            McpMethod::Unknown(name) => Err((-32601, format!("Method not found: {name}"))),
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn handle_list_tools(&self) -> Value {
        serde_json::json!({ "tools": self.tools.list_tools() })
    }

    /// Tool failures are reported in the result with `isError`, not as
    /// JSON-RPC errors.
    async fn handle_call_tool(&self, params: Option<Value>) -> DispatchResult {
        let params = params.ok_or((-32602, "Missing params".to_string()))?;

        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or((-32602, "Missing tool name".to_string()))?
            .to_string();

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let result = self
            .tools
            .execute(&name, arguments)
            .instrument(info_span!("mcp.tool.call", tool.name = name.as_str()))
            .await
            .unwrap_or_else(|e| {
                log_tool_error(&name, &e);
                ToolResult::error(e.to_string())
            });

        serde_json::to_value(result).map_err(|e| (-32603, format!("Internal error: {e}")))
    }
}

fn log_tool_error(tool: &str, error: &AppError) {
    match error {
        AppError::Validation(_) => tracing::warn!(tool, "Tool call rejected: {}", error),
        _ => tracing::error!(tool, "Tool call failed: {}", error),
    }
}

fn format_response(id: Value, result: DispatchResult) -> String {
    match result {
        Ok(value) => {
            let response = JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: Some(value),
                error: None,
            };
            serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string())
        }
        Err((code, message)) => format_error(id, code, &message),
    }
}

fn format_error(id: Value, code: i32, message: &str) -> String {
    let response = JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
        }),
    };
    serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string())
}

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    /// `Some(Value::Null)` for an explicit null id, `None` when absent
    #[serde(default, deserialize_with = "present")]
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}
