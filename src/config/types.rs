//! Configuration data model.
//!
//! This module holds struct definitions plus default values. Loader and
//! source-resolution logic stays in `config::mod` so precedence behavior is
//! centralized.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::defaults::{
    default_allowed_commands, DEFAULT_BACKUP_SUFFIX, DEFAULT_BASE_URL,
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_SEARCH_RESULTS,
    DEFAULT_MAX_TOOL_ITERATIONS, DEFAULT_MODEL_MAX_RETRIES, DEFAULT_MODEL_NAME,
    DEFAULT_MODEL_TIMEOUT_SECS, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_SHELL,
};
use crate::tools::aliases::ParameterAliases;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub safety: SafetyConfig,
    pub tools: ToolsConfig,
    pub mcp: McpConfig,
    pub display: DisplayConfig,
}

/// Model server connection and sampling settings (`[model]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI-compatible prefix, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub name: String,
    pub api_key: String,
    /// Environment variable to read the API key from when `api_key` is empty.
    pub api_key_env: Option<String>,
    pub temperature: Option<f64>,
    /// Per-request HTTP timeout. Local models can be slow to load.
    pub timeout_secs: u64,
    /// Re-sends after a transient failure (connection refused, 429, 5xx).
    pub max_retries: u32,
    /// First retry delay in milliseconds; doubles on each further retry.
    pub retry_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            name: DEFAULT_MODEL_NAME.into(),
            api_key: String::new(),
            api_key_env: None,
            temperature: None,
            timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
            max_retries: DEFAULT_MODEL_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

/// Agent loop settings (`[agent]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum tool rounds per user message before the loop gives up.
    pub max_tool_iterations: usize,
    /// Extra operator instructions appended to the built-in system prompt.
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            system_prompt: String::new(),
        }
    }
}

/// Execution gates (`[safety]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Restrict shell commands to `allowed_commands`.
    pub safe_mode: bool,
    /// Skip interactive confirmation prompts. Never bypasses the allowlist.
    pub auto_approve: bool,
    /// Program names permitted as the leading token of a shell command.
    pub allowed_commands: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            safe_mode: true,
            auto_approve: false,
            allowed_commands: default_allowed_commands(),
        }
    }
}

/// Built-in tool settings (`[tools]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Shell used for `run-command` (`<shell> -c <command>`).
    pub shell: String,
    /// Default `run-command` timeout when the model does not pass one.
    pub command_timeout_secs: u64,
    /// Maximum bytes of tool output folded back into the conversation.
    pub max_output_bytes: usize,
    /// Result cap for `find-files` and `search-content`.
    pub max_search_results: usize,
    /// Suffix appended to the edited path for `edit-file` backups.
    pub backup_suffix: String,
    /// Accepted spellings for each logical tool parameter.
    pub aliases: ParameterAliases,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.into(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.into(),
            aliases: ParameterAliases::default(),
        }
    }
}

/// Auxiliary tool servers (`[mcp.servers.<name>]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub servers: BTreeMap<String, McpServerConfig>,
}

/// One stdio MCP server launched as a child process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct McpServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub enabled: bool,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            enabled: true,
        }
    }
}

/// Display / rendering preferences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
    pub show_tool_calls: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_tool_calls: true,
        }
    }
}

/// Configuration payload plus where it was read from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// `None` when built-in defaults were used.
    pub source: Option<PathBuf>,
}

/// Result of explicit global config initialization (`loco init`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalConfigInitResult {
    Created { path: PathBuf },
    AlreadyInitialized { path: PathBuf },
    Overwritten { path: PathBuf, backup_path: PathBuf },
}
