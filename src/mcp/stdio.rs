//! One MCP server child process speaking newline-delimited JSON-RPC 2.0.

use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::McpServerConfig;

const PROTOCOL_VERSION: &str = "2024-11-05";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTool {
    pub name: String,
    pub description: String,
}

struct Channel {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

pub(super) struct StdioServer {
    name: String,
    channel: Mutex<Channel>,
    tools: Vec<RemoteTool>,
    // Held for kill_on_drop.
    _child: Mutex<Child>,
}

impl StdioServer {
    /// Spawn the server and run the initialize / tools/list handshake.
    pub(super) async fn start(name: &str, config: &McpServerConfig) -> Result<Self, String> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to start `{}`: {e}", config.command))?;
        let stdin = child.stdin.take().ok_or("child stdin unavailable")?;
        let stdout = child.stdout.take().ok_or("child stdout unavailable")?;

        let mut server = Self {
            name: name.to_string(),
            channel: Mutex::new(Channel {
                stdin,
                lines: BufReader::new(stdout).lines(),
                next_id: 1,
            }),
            tools: Vec::new(),
            _child: Mutex::new(child),
        };

        server
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "loco", "version": env!("CARGO_PKG_VERSION") },
                }),
            )
            .await?;
        server.notify("notifications/initialized").await?;
        let listing = server.request("tools/list", json!({})).await?;
        server.tools = parse_tool_list(&listing);
        debug!(server = name, tools = server.tools.len(), "mcp server ready");
        Ok(server)
    }

    pub(super) fn tools(&self) -> &[RemoteTool] {
        &self.tools
    }

    pub(super) fn has_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t.name == tool)
    }

    /// `tools/call`, returning the joined text content.
    pub(super) async fn call_tool(&self, tool: &str, arguments: Value) -> Result<String, String> {
        let result = self
            .request("tools/call", json!({ "name": tool, "arguments": arguments }))
            .await?;
        extract_call_result(&result)
    }

    async fn notify(&self, method: &str) -> Result<(), String> {
        let mut channel = self.channel.lock().await;
        let frame = json!({ "jsonrpc": "2.0", "method": method });
        write_frame(&mut channel.stdin, &frame).await
    }

    /// Send one request and wait for the response with the same id.
    ///
    /// Notifications and unrelated ids arriving in between are skipped.
    async fn request(&self, method: &str, params: Value) -> Result<Value, String> {
        let mut channel = self.channel.lock().await;
        let id = channel.next_id;
        channel.next_id += 1;
        let frame = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        write_frame(&mut channel.stdin, &frame).await?;

        let response = tokio::time::timeout(REQUEST_TIMEOUT, read_response(&mut channel.lines, id))
            .await
            .map_err(|_| format!("{method}: no response from `{}` after {REQUEST_TIMEOUT:?}", self.name))??;
        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(format!("{method}: {message}"));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

async fn write_frame(stdin: &mut ChildStdin, frame: &Value) -> Result<(), String> {
    let mut line = frame.to_string();
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| format!("write to server failed: {e}"))?;
    stdin
        .flush()
        .await
        .map_err(|e| format!("write to server failed: {e}"))
}

async fn read_response(
    lines: &mut Lines<BufReader<ChildStdout>>,
    id: u64,
) -> Result<Value, String> {
    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| format!("read from server failed: {e}"))?
            .ok_or("server closed its output")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "ignoring non-JSON line from mcp server");
                continue;
            }
        };
        if message.get("id").and_then(Value::as_u64) == Some(id) {
            return Ok(message);
        }
    }
}

pub(super) fn parse_tool_list(result: &Value) -> Vec<RemoteTool> {
    result
        .get("tools")
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .filter_map(|tool| {
                    let name = tool.get("name")?.as_str()?.to_string();
                    let description = tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Some(RemoteTool { name, description })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Join `content[].text` entries; `isError: true` turns the text into an error.
pub(super) fn extract_call_result(result: &Value) -> Result<String, String> {
    let text = match result.get("content").and_then(Value::as_array) {
        Some(content) => content
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        None => result.to_string(),
    };
    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return Err(if text.is_empty() {
            "tool reported an error".to_string()
        } else {
            text
        });
    }
    Ok(text)
}
