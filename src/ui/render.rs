//! Rendering contract and the default terminal renderer.
//!
//! `RenderSink` is the UI contract consumed by the agent loop. Status lines
//! go to stderr and final answers to stdout, so `loco "..." > out.md`
//! captures only the answer.

use crossterm::style::{Color, Stylize};

use crate::textutil::truncate_with_suffix_by_chars;
use crate::tools::{ToolInvocation, ToolResult};

use super::markdown::render_markdown_for_terminal;

const INDENT: &str = "  ";
const GLYPH_TOOL_CALL: &str = "▶";
const GLYPH_TOOL_CALL_PLAIN: &str = ">";
const GLYPH_TOOL_RESULT: &str = "\u{2190}";
const GLYPH_TOOL_RESULT_PLAIN: &str = "<-";
const PREVIEW_CHARS: usize = 100;

/// Injectable rendering interface used by the agent loop.
///
/// `Renderer` is the terminal implementation; tests substitute recording
/// sinks without touching stderr.
pub trait RenderSink: Send + Sync {
    /// Model text that accompanied tool calls.
    fn commentary(&self, text: &str);
    /// About to execute one invocation.
    fn tool_call(&self, invocation: &ToolInvocation);
    /// One invocation finished. Failures must always be shown.
    fn tool_result(&self, invocation: &ToolInvocation, result: &ToolResult);
    /// The final answer of a turn.
    fn answer(&self, text: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
    /// Neutral status text (slash command output, banners).
    fn info(&self, msg: &str);
}

/// Handles all terminal output formatting.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
    show_tool_calls: bool,
}

impl Renderer {
    pub fn new(color: bool, show_tool_calls: bool) -> Self {
        Self {
            color,
            show_tool_calls,
        }
    }

    /// Print the user input prompt indicator (to stderr).
    pub fn prompt(&self) {
        if self.color {
            eprint!("{} ", ">".with(Color::Green).bold());
        } else {
            eprint!("> ");
        }
    }

    /// Print the session header.
    pub fn header(&self, model: &str, base_url: &str) {
        if self.color {
            eprintln!(
                "{} {} {}",
                "loco".with(Color::Green).bold(),
                model.with(Color::Cyan),
                format!("({base_url})").with(Color::DarkGrey)
            );
        } else {
            eprintln!("loco {model} ({base_url})");
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.with(Color::DarkGrey).to_string()
        } else {
            text.to_string()
        }
    }
}

impl RenderSink for Renderer {
    fn commentary(&self, text: &str) {
        let rendered = render_markdown_for_terminal(text);
        if !rendered.trim().is_empty() {
            eprintln!("{}", self.dim(&rendered));
        }
    }

    fn tool_call(&self, invocation: &ToolInvocation) {
        if !self.show_tool_calls {
            return;
        }
        let preview = invocation_preview(invocation);
        if self.color {
            eprintln!(
                "{INDENT}{} {}({})",
                GLYPH_TOOL_CALL.with(Color::DarkYellow),
                invocation.name.as_str().with(Color::Yellow).bold(),
                preview.with(Color::Grey),
            );
        } else {
            eprintln!("{INDENT}{GLYPH_TOOL_CALL_PLAIN} {}({preview})", invocation.name);
        }
    }

    fn tool_result(&self, invocation: &ToolInvocation, result: &ToolResult) {
        if let Some(message) = result.error_message() {
            let line = format!("{} failed: {message}", invocation.name);
            if self.color {
                eprintln!(
                    "{INDENT}{} {}",
                    "✗".with(Color::Red).bold(),
                    line.with(Color::Red)
                );
            } else {
                eprintln!("{INDENT}x {line}");
            }
            return;
        }
        if !self.show_tool_calls {
            return;
        }
        let summary = result_summary(result);
        if self.color {
            eprintln!(
                "{INDENT}{} {}",
                GLYPH_TOOL_RESULT.with(Color::DarkGrey),
                summary.with(Color::DarkGrey),
            );
        } else {
            eprintln!("{INDENT}{GLYPH_TOOL_RESULT_PLAIN} {summary}");
        }
    }

    fn answer(&self, text: &str) {
        println!("{}", render_markdown_for_terminal(text));
    }

    fn warn(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", "warning:".with(Color::Yellow).bold());
        } else {
            eprintln!("warning: {msg}");
        }
    }

    fn error(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", "error:".with(Color::Red).bold());
        } else {
            eprintln!("error: {msg}");
        }
    }

    fn info(&self, msg: &str) {
        eprintln!("{msg}");
    }
}

/// `key=value, ...` on one line, each value cut to its first line.
pub fn invocation_preview(invocation: &ToolInvocation) -> String {
    let joined = invocation
        .parameters
        .iter()
        .map(|(key, value)| {
            let first = value.trim().lines().next().unwrap_or_default();
            let more = if value.trim().lines().nth(1).is_some() {
                " …"
            } else {
                ""
            };
            format!("{key}={first}{more}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    truncate_with_suffix_by_chars(&joined, PREVIEW_CHARS, "…")
}

/// First output line plus a line count, for the status line.
pub fn result_summary(result: &ToolResult) -> String {
    let output = result.output.trim();
    if output.is_empty() {
        return "ok (no output)".to_string();
    }
    let lines = output.lines().count();
    let first = output.lines().next().unwrap_or_default();
    let first = truncate_with_suffix_by_chars(first, PREVIEW_CHARS, "…");
    if lines == 1 {
        first
    } else {
        format!("{first} (+{} lines)", lines - 1)
    }
}
