//! Auxiliary tool servers (Model Context Protocol over stdio).
//!
//! Tools exposed here are addressed as `server.tool`. The dispatcher only
//! sees the [`AuxiliaryTools`] trait; [`McpManager`] is the production
//! implementation and tests substitute fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::McpConfig;
use crate::error::ToolError;

mod stdio;

pub use stdio::RemoteTool;
use stdio::StdioServer;

/// Capability to call tools owned by external servers.
#[async_trait]
pub trait AuxiliaryTools: Send + Sync {
    async fn call(&self, server: &str, tool: &str, arguments: Value) -> Result<String, ToolError>;

    /// `(server.tool, description)` pairs, for the system prompt and `/tools`.
    fn tool_descriptions(&self) -> Vec<(String, String)>;
}

/// Running MCP servers keyed by configured name.
#[derive(Default)]
pub struct McpManager {
    servers: BTreeMap<String, StdioServer>,
}

impl McpManager {
    /// Start every enabled server. Failures are logged and skipped.
    pub async fn start(config: &McpConfig) -> Self {
        let mut servers = BTreeMap::new();
        for (name, server) in config.servers.iter().filter(|(_, s)| s.enabled) {
            match StdioServer::start(name, server).await {
                Ok(running) => {
                    info!(server = %name, tools = running.tools().len(), "mcp server started");
                    servers.insert(name.clone(), running);
                }
                Err(e) => warn!(server = %name, error = %e, "skipping mcp server"),
            }
        }
        Self { servers }
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn server_names(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }
}

#[async_trait]
impl AuxiliaryTools for McpManager {
    async fn call(&self, server: &str, tool: &str, arguments: Value) -> Result<String, ToolError> {
        let running = self
            .servers
            .get(server)
            .ok_or_else(|| ToolError::NotFound(format!("no auxiliary server named `{server}`")))?;
        if !running.has_tool(tool) {
            return Err(ToolError::NotFound(format!(
                "`{server}` has no tool named `{tool}`"
            )));
        }
        running
            .call_tool(tool, arguments)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("{server}.{tool}: {e}")))
    }

    fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.servers
            .iter()
            .flat_map(|(server, running)| {
                running
                    .tools()
                    .iter()
                    .map(move |t| (format!("{server}.{}", t.name), t.description.clone()))
            })
            .collect()
    }
}

/// Convert string parameters into a JSON argument object.
///
/// Values that parse as JSON keep their JSON type; anything else is a
/// string. A lone `arguments` parameter holding an object is used whole.
pub fn params_to_arguments(params: &BTreeMap<String, String>) -> Value {
    if params.len() == 1 {
        if let Some(raw) = params.get("arguments") {
            if let Ok(object @ Value::Object(_)) = serde_json::from_str::<Value>(raw.trim()) {
                return object;
            }
        }
    }
    let object: Map<String, Value> = params
        .iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str::<Value>(raw.trim())
                .unwrap_or_else(|_| Value::String(raw.clone()));
            (key.clone(), value)
        })
        .collect();
    Value::Object(object)
}
