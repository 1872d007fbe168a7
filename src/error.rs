//! Unified error types for the agent.
//!
//! Tool-level failures ([`ToolError`]) never escape the conversation loop:
//! they are folded into the next model turn. Only [`AgentError`] values
//! propagate to the caller.

use std::fmt;

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// Why a single tool invocation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Required parameters were missing or unusable.
    InvalidArguments(String),
    /// Blocked by the safe-mode command allowlist.
    Denied(String),
    /// The user declined the confirmation prompt.
    Cancelled(String),
    /// The tool ran but its underlying operation failed.
    ExecutionFailed(String),
    /// No built-in or auxiliary tool matches the requested name.
    NotFound(String),
    /// A spawned command exceeded its time limit.
    Timeout(String),
    /// A spawned command was interrupted by the user.
    Interrupted(String),
}

impl ToolError {
    /// Short machine-friendly label for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Denied(_) => "denied",
            Self::Cancelled(_) => "cancelled",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
            Self::Interrupted(_) => "interrupted",
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
            Self::Denied(msg) => write!(f, "denied by safe mode: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled by user: {msg}"),
            Self::ExecutionFailed(msg) => write!(f, "execution failed: {msg}"),
            Self::NotFound(name) => write!(f, "tool not found: {name}"),
            Self::Timeout(msg) => write!(f, "timed out: {msg}"),
            Self::Interrupted(msg) => write!(f, "interrupted: {msg}"),
        }
    }
}

impl std::error::Error for ToolError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the model server transport.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the server.
    Status {
        code: u16,
        body: String,
        retry_after_secs: Option<u64>,
    },
    /// The server answered 2xx with a payload we could not use.
    InvalidResponse(String),
}

impl ApiError {
    pub fn status(code: u16, body: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::Status {
            code,
            body: body.into(),
            retry_after_secs,
        }
    }

    /// HTTP status code, when the failure came from a server response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidResponse(_) => None,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Status {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status { code, body, .. } => write!(f, "status {code}: {body}"),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// AgentError
// ---------------------------------------------------------------------------

/// Errors that terminate a conversation turn and reach the caller.
#[derive(Debug)]
pub enum AgentError {
    Config(ConfigError),
    /// The model server could not be reached or failed the request.
    Api(ApiError),
    /// The loop needed more tool rounds than the configured cap.
    MaxIterationsReached { limit: usize },
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Api(e) => write!(f, "model request failed: {e}"),
            Self::MaxIterationsReached { limit } => {
                write!(f, "gave up after {limit} tool iterations without a final answer")
            }
        }
    }
}

impl std::error::Error for AgentError {}

impl From<ConfigError> for AgentError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ApiError> for AgentError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display() {
        assert_eq!(
            ToolError::InvalidArguments("missing `command`".into()).to_string(),
            "invalid arguments: missing `command`"
        );
        assert_eq!(
            ToolError::NotFound("Frobnicate".into()).to_string(),
            "tool not found: Frobnicate"
        );
        assert_eq!(
            ToolError::Cancelled("Write".into()).to_string(),
            "cancelled by user: Write"
        );
    }

    #[test]
    fn tool_error_kinds_are_distinct() {
        let kinds = [
            ToolError::InvalidArguments(String::new()).kind(),
            ToolError::Denied(String::new()).kind(),
            ToolError::Cancelled(String::new()).kind(),
            ToolError::ExecutionFailed(String::new()).kind(),
            ToolError::NotFound(String::new()).kind(),
            ToolError::Timeout(String::new()).kind(),
            ToolError::Interrupted(String::new()).kind(),
        ];
        let mut unique = kinds.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e = ConfigError::from(io_err);
        let s = e.to_string();
        assert!(s.starts_with("io:"), "got: {s}");
        assert!(s.contains("file not found"));
    }

    #[test]
    fn config_error_from_toml() {
        let toml_err: toml::de::Error = toml::from_str::<toml::Value>("x = [unclosed").unwrap_err();
        let e = ConfigError::from(toml_err);
        assert!(e.to_string().starts_with("toml:"));
    }

    #[test]
    fn api_error_status_accessors() {
        let err = ApiError::status(429, "slow down", Some(3));
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.retry_after_secs(), Some(3));
        assert_eq!(err.to_string(), "status 429: slow down");
    }

    #[test]
    fn agent_error_display_variants() {
        assert_eq!(
            AgentError::MaxIterationsReached { limit: 4 }.to_string(),
            "gave up after 4 tool iterations without a final answer"
        );
        let api = AgentError::from(ApiError::InvalidResponse("no choices".into()));
        assert!(api.to_string().contains("no choices"), "got: {api}");
    }
}
