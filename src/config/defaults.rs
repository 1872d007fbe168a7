//! Default configuration constants.
//!
//! Callers share these constants instead of duplicating literals.

/// Embedded default `loco.toml` template written by `loco init`.
pub(super) const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../templates/loco.toml");
/// Ollama's OpenAI-compatible endpoint.
pub(super) const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
pub(super) const DEFAULT_MODEL_NAME: &str = "qwen2.5-coder:7b";
pub(super) const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 300;
pub(super) const DEFAULT_MODEL_MAX_RETRIES: u32 = 2;
pub(super) const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
pub(super) const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;
pub(super) const DEFAULT_SHELL: &str = "sh";
pub(super) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;
pub(super) const DEFAULT_MAX_OUTPUT_BYTES: usize = 16_000;
pub(super) const DEFAULT_MAX_SEARCH_RESULTS: usize = 200;
pub(super) const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Read-mostly programs permitted in safe mode out of the box.
pub(super) fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "wc", "grep", "rg", "pwd", "echo", "git", "cargo", "diff",
        "sort", "uniq", "tree", "which", "file", "stat", "du", "df", "date", "whoami", "uname",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
