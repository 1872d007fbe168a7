//! Per-invocation safety gate.
//!
//! Two independent axes:
//! - safe mode restricts shell commands to allowlisted programs;
//! - confirmation guards shell commands, writes, edits and auxiliary tools.
//!   Auto-approve waives confirmation only.

use crate::config::SafetyConfig;

use super::{BuiltinTool, ToolTarget};

/// Gate outcome for one invocation. Computed fresh every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyDecision {
    Allowed,
    RequiresConfirmation,
    /// Blocked outright; carries the reason shown to the model.
    Denied(String),
}

impl SafetyDecision {
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, Self::RequiresConfirmation)
    }
}

#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    pub safe_mode: bool,
    pub auto_approve: bool,
    allowed_commands: Vec<String>,
}

impl SafetyPolicy {
    pub fn new(safe_mode: bool, auto_approve: bool, allowed_commands: Vec<String>) -> Self {
        Self {
            safe_mode,
            auto_approve,
            allowed_commands,
        }
    }

    pub fn from_config(config: &SafetyConfig) -> Self {
        Self::new(
            config.safe_mode,
            config.auto_approve,
            config.allowed_commands.clone(),
        )
    }

    pub fn allowed_commands(&self) -> &[String] {
        &self.allowed_commands
    }

    /// Classify one invocation.
    ///
    /// `command` is the literal shell command for run-command and is ignored
    /// for every other target.
    pub fn decide(&self, target: &ToolTarget, command: Option<&str>) -> SafetyDecision {
        match target {
            ToolTarget::Builtin(BuiltinTool::RunCommand) => {
                self.decide_command(command.unwrap_or_default())
            }
            ToolTarget::Builtin(tool) if tool.is_read_only() => SafetyDecision::Allowed,
            ToolTarget::Builtin(_) | ToolTarget::Auxiliary { .. } => self.confirm_unless_approved(),
            ToolTarget::Unknown(name) => SafetyDecision::Denied(format!("unknown tool `{name}`")),
        }
    }

    /// The allowlist and the prompt are separate gates: passing the first
    /// never waives the second.
    fn decide_command(&self, command: &str) -> SafetyDecision {
        if self.safe_mode {
            if let Err(reason) = self.check_allowlist(command) {
                return SafetyDecision::Denied(reason);
            }
        }
        self.confirm_unless_approved()
    }

    fn confirm_unless_approved(&self) -> SafetyDecision {
        if self.auto_approve {
            SafetyDecision::Allowed
        } else {
            SafetyDecision::RequiresConfirmation
        }
    }

    /// Every command segment must start with an allowlisted program.
    ///
    /// Segments are split on `;`, `&`, `|` and newlines outside quotes.
    /// Command substitution could run anything, so it is refused outright.
    pub fn check_allowlist(&self, command: &str) -> Result<(), String> {
        let command = command.trim();
        if command.is_empty() {
            return Err("empty command".into());
        }
        if command.contains("$(") || command.contains('`') {
            return Err("command substitution is not allowed in safe mode".into());
        }
        for segment in split_segments(command) {
            let Some(program) = leading_program(segment) else {
                continue;
            };
            if !self.allowed_commands.iter().any(|allowed| allowed == program) {
                return Err(format!(
                    "`{program}` is not in the safe-mode allowlist (allowed: {})",
                    self.allowed_commands.join(", ")
                ));
            }
        }
        Ok(())
    }
}

/// Split a shell command on control operators, respecting quotes.
fn split_segments(command: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in command.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (_, '\\') if quote != Some('\'') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            // `2>&1` and `&>` are redirections, not control operators.
            (None, '&') if is_redirect_ampersand(command, idx) => {}
            (None, ';' | '&' | '|' | '\n') => {
                segments.push(&command[start..idx]);
                start = idx + ch.len_utf8();
            }
            (None, _) => {}
        }
    }
    segments.push(&command[start..]);
    segments
}

fn is_redirect_ampersand(command: &str, idx: usize) -> bool {
    command[..idx].ends_with(['>', '<']) || command[idx + 1..].starts_with('>')
}

/// Basename of the first word that is not an env assignment or a subshell paren.
fn leading_program(segment: &str) -> Option<&str> {
    segment
        .split_whitespace()
        .map(|word| word.trim_start_matches(['(', '{']))
        .find(|word| !word.is_empty() && !is_env_assignment(word))
        .map(|word| word.rsplit('/').next().unwrap_or(word))
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
