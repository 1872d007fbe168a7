//! Tool invocations, results and the built-in tool table.
//!
//! The model requests tools through tagged markup (see [`parser`]). Each
//! parsed [`ToolInvocation`] is resolved to a [`ToolTarget`], gated by the
//! [`policy::SafetyPolicy`] and executed by the [`dispatch::Dispatcher`],
//! which always produces exactly one [`ToolResult`].

pub mod aliases;
pub mod confirm;
pub mod dispatch;
pub mod files;
pub mod parser;
pub mod policy;
pub mod search;
pub mod shell;

use std::collections::BTreeMap;
use std::future::pending;

use tokio::sync::watch;

use crate::error::ToolError;
use crate::textutil::truncate_with_suffix_by_bytes;

/// Suffix appended when tool output is cut to the configured byte budget.
pub const TRUNCATION_SUFFIX: &str = "...[truncated]";

// ---------------------------------------------------------------------------
// Invocation / result
// ---------------------------------------------------------------------------

/// One requested action extracted from model text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub name: String,
    /// Later duplicate keys overwrite earlier ones.
    pub parameters: BTreeMap<String, String>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion, mostly for tests and callers
    /// constructing invocations by hand.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Comma-separated parameter names, or `(none)`.
    pub fn received_parameters(&self) -> String {
        if self.parameters.is_empty() {
            return "(none)".to_string();
        }
        self.parameters
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Outcome of executing one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub succeeded: bool,
    /// Present for command-style tools.
    pub exit_status: Option<i32>,
    pub output: String,
    /// Present whenever `succeeded` is false.
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            exit_status: None,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self {
            succeeded: false,
            exit_status: None,
            output: String::new(),
            error: Some(error),
        }
    }

    /// Result of a finished process: success iff the exit status is zero.
    pub fn from_exit(exit_status: Option<i32>, output: String) -> Self {
        match exit_status {
            Some(0) => Self {
                succeeded: true,
                exit_status,
                output,
                error: None,
            },
            Some(code) => Self {
                succeeded: false,
                exit_status,
                output,
                error: Some(ToolError::ExecutionFailed(format!(
                    "command exited with status {code}"
                ))),
            },
            None => Self {
                succeeded: false,
                exit_status: None,
                output,
                error: Some(ToolError::ExecutionFailed(
                    "command terminated by signal".into(),
                )),
            },
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// The error's display text for failed results. It already names the kind.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Cut `output` to at most `max_bytes` on a character boundary.
    pub fn truncated(mut self, max_bytes: usize) -> Self {
        if self.output.len() > max_bytes {
            self.output = truncate_with_suffix_by_bytes(&self.output, max_bytes, TRUNCATION_SUFFIX);
        }
        self
    }
}

impl From<Result<ToolResult, ToolError>> for ToolResult {
    fn from(value: Result<ToolResult, ToolError>) -> Self {
        value.unwrap_or_else(ToolResult::failure)
    }
}

// ---------------------------------------------------------------------------
// Built-in tool table
// ---------------------------------------------------------------------------

/// The fixed built-in tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTool {
    RunCommand,
    ReadFile,
    WriteFile,
    EditFile,
    FindFiles,
    SearchContent,
}

/// Static description of one built-in tool.
#[derive(Debug)]
pub struct BuiltinSpec {
    pub tool: BuiltinTool,
    /// Name advertised to the model.
    pub display_name: &'static str,
    /// Every accepted spelling (compared case-insensitively).
    pub names: &'static [&'static str],
    pub summary: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

pub const BUILTIN_TOOLS: &[BuiltinSpec] = &[
    BuiltinSpec {
        tool: BuiltinTool::RunCommand,
        display_name: "Bash",
        names: &["bash", "run_command", "run-command"],
        summary: "Run a shell command and capture combined stdout/stderr and the exit status.",
        required: &["command"],
        optional: &["description", "timeout"],
    },
    BuiltinSpec {
        tool: BuiltinTool::ReadFile,
        display_name: "Read",
        names: &["read", "read_file", "read-file"],
        summary: "Read a whole text file.",
        required: &["file_path"],
        optional: &[],
    },
    BuiltinSpec {
        tool: BuiltinTool::WriteFile,
        display_name: "Write",
        names: &["write", "write_file", "write-file"],
        summary: "Create or overwrite a file with the given content. Parent directories are created.",
        required: &["file_path", "content"],
        optional: &[],
    },
    BuiltinSpec {
        tool: BuiltinTool::EditFile,
        display_name: "Edit",
        names: &["edit", "edit_file", "edit-file"],
        summary: "Replace every occurrence of old_string with new_string (omit new_string to delete). A backup is written first.",
        required: &["file_path", "old_string"],
        optional: &["new_string"],
    },
    BuiltinSpec {
        tool: BuiltinTool::FindFiles,
        display_name: "Glob",
        names: &["glob", "find_files", "find-files"],
        summary: "Find files by glob pattern, recursively under path.",
        required: &["pattern"],
        optional: &["path"],
    },
    BuiltinSpec {
        tool: BuiltinTool::SearchContent,
        display_name: "Grep",
        names: &["grep", "search_content", "search-content"],
        summary: "Search file contents by regex. mode is files-only (default) or content (file:line: text).",
        required: &["pattern"],
        optional: &["path", "mode"],
    },
];

impl BuiltinTool {
    /// Look up a built-in by any accepted spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        BUILTIN_TOOLS
            .iter()
            .find(|spec| spec.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .map(|spec| spec.tool)
    }

    pub fn spec(self) -> &'static BuiltinSpec {
        // The table has one row per variant, in declaration order.
        &BUILTIN_TOOLS[self as usize]
    }

    pub fn display_name(self) -> &'static str {
        self.spec().display_name
    }

    /// Tools with no side effects beyond filesystem reads.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::ReadFile | Self::FindFiles | Self::SearchContent
        )
    }
}

/// Where an invocation name routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolTarget {
    Builtin(BuiltinTool),
    /// A `server.tool` name owned by an auxiliary tool server.
    Auxiliary { server: String, tool: String },
    Unknown(String),
}

impl ToolTarget {
    pub fn resolve(name: &str) -> Self {
        let trimmed = name.trim();
        if let Some((server, tool)) = trimmed.split_once('.') {
            if server.is_empty() || tool.is_empty() {
                return Self::Unknown(trimmed.to_string());
            }
            return Self::Auxiliary {
                server: server.to_string(),
                tool: tool.to_string(),
            };
        }
        match BuiltinTool::from_name(trimmed) {
            Some(tool) => Self::Builtin(tool),
            None => Self::Unknown(trimmed.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Read side of the process-wide interrupt flag (Ctrl-C).
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once the flag is set. Pending forever if the sender is gone.
    pub async fn cancelled(&self) {
        let Some(mut rx) = self.rx.clone() else {
            return pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return pending().await;
            }
        }
    }
}
