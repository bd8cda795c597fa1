//! MCP (Model Context Protocol) server for Doc2MD.
//!
//! Speaks newline-delimited JSON-RPC 2.0 over stdin/stdout. Stdout carries
//! protocol messages only; logs go to stderr.

pub mod protocol;
pub mod tools;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use doc2md_core::Converter;

use crate::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, McpRequest, McpResponse, PARSE_ERROR,
    PROTOCOL_VERSION,
};

const SERVER_NAME: &str = "doc2md";

/// Tool server state.
#[derive(Debug, Clone)]
pub struct McpServer {
    converter: Converter,
    max_output_chars: usize,
}

impl McpServer {
    pub fn new(converter: Converter, max_output_chars: usize) -> Self {
        Self {
            converter,
            max_output_chars,
        }
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Read requests line by line from `input`, answering on `output`.
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Doc2MD MCP server starting");

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(response) = self.handle_line(line).await else {
                continue;
            };

            let mut payload = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
            payload.push(b'\n');
            output.write_all(&payload).await?;
            output.flush().await?;
        }

        info!("stdin closed, MCP server shutting down");
        Ok(())
    }

    /// Handle one raw line; `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "invalid JSON on stdin");
                return Some(McpResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: McpRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(McpResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ));
            }
        };

        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }

        Some(self.handle_request(request).await)
    }

    /// Dispatch a request to its method handler.
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        let id = request.id.unwrap_or(Value::Null);
        debug!(method = %request.method, "request");

        match request.method.as_str() {
            "initialize" => McpResponse::result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION")
                    },
                    "capabilities": {
                        "tools": {}
                    }
                }),
            ),

            "ping" => McpResponse::result(id, json!({})),

            "tools/list" => McpResponse::result(id, json!({ "tools": tools::list_tools() })),

            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                let Some(name) = params.get("name").and_then(Value::as_str) else {
                    return McpResponse::error(id, INVALID_PARAMS, "tools/call requires a tool name");
                };
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

                let output =
                    tools::call_tool(&self.converter, self.max_output_chars, name, &arguments)
                        .await;
                McpResponse::result(id, output.into_value())
            }

            other => {
                warn!(method = other, "unknown method");
                McpResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
            }
        }
    }
}
