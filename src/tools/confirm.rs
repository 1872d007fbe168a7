//! Confirmation collaborator.
//!
//! Executors ask for approval at the point they know what they are about to
//! do (e.g. after counting edit occurrences), through an [`Approval`] gate
//! built from the invocation's safety decision.

use std::io::{BufRead, Write};

use crossterm::style::{Color, Stylize};

use crate::error::ToolError;

/// Blocking yes/no question posed to the user.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, tool: &str, description: &str) -> bool;
}

/// Approves everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl Confirmer for AutoApprove {
    fn confirm(&self, _tool: &str, _description: &str) -> bool {
        true
    }
}

/// Interactive `[y/N]` prompt on stderr, answer read from stdin.
#[derive(Debug, Clone, Copy)]
pub struct TerminalConfirmer {
    color: bool,
}

impl TerminalConfirmer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn render_prompt(&self, tool: &str, description: &str) {
        let color = self.color;
        let mut err = std::io::stderr().lock();
        if color {
            let _ = writeln!(
                err,
                "{} {} wants to run:",
                "•".with(Color::DarkGrey),
                tool.with(Color::Yellow).bold()
            );
        } else {
            let _ = writeln!(err, "• {tool} wants to run:");
        }
        for line in description.lines() {
            if color {
                let _ = writeln!(err, "  {}", line.with(Color::White));
            } else {
                let _ = writeln!(err, "  {line}");
            }
        }
        let _ = write!(err, "Approve? [y/N] ");
        let _ = err.flush();
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, tool: &str, description: &str) -> bool {
        self.render_prompt(tool, description);
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        read_answer(&mut input)
    }
}

/// `y`/`yes` (any case) approves; anything else, including EOF, declines.
pub(crate) fn read_answer(input: &mut impl BufRead) -> bool {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
    }
}

/// Format a shell command as a `$ ...` block for prompts.
pub fn format_command_block(command: &str) -> String {
    if command.trim().is_empty() {
        return "$".to_string();
    }
    command
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 {
                format!("$ {line}")
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Confirmation gate handed to one executor call.
pub struct Approval<'a> {
    required: bool,
    tool: &'a str,
    confirmer: &'a dyn Confirmer,
}

impl<'a> Approval<'a> {
    pub fn new(required: bool, tool: &'a str, confirmer: &'a dyn Confirmer) -> Self {
        Self {
            required,
            tool,
            confirmer,
        }
    }

    /// A gate that never prompts.
    pub fn not_required(tool: &'a str) -> Self {
        Self::new(false, tool, &AutoApprove)
    }

    /// Ask the user when required. A refusal becomes `ToolError::Cancelled`.
    pub fn obtain(&self, description: &str) -> Result<(), ToolError> {
        if !self.required || self.confirmer.confirm(self.tool, description) {
            return Ok(());
        }
        let summary = description.lines().next().unwrap_or(description);
        Err(ToolError::Cancelled(summary.to_string()))
    }
}
