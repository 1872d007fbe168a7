//! Serialization of one batch of tool results into a conversation turn.

use crate::tools::{ToolInvocation, ToolResult};

/// Body used when a successful tool printed nothing.
const EMPTY_OUTPUT: &str = "(no output)";

/// Render `<tool_results>` with one entry per invocation, in order.
pub(super) fn format_results_turn(batch: &[(ToolInvocation, ToolResult)]) -> String {
    let mut out = String::from("<tool_results>\n");
    for (idx, (invocation, result)) in batch.iter().enumerate() {
        push_entry(
            &mut out,
            idx + 1,
            &invocation.name,
            result.succeeded,
            result.exit_status,
            &result_body(result),
        );
    }
    out.push_str("</tool_results>");
    out
}

/// Render `<tool_results>` for calls the loop refused to start, so the
/// requesting assistant turn is never left without an answer.
pub(super) fn format_not_run_turn(invocations: &[ToolInvocation], reason: &str) -> String {
    let mut out = String::from("<tool_results>\n");
    for (idx, invocation) in invocations.iter().enumerate() {
        push_entry(
            &mut out,
            idx + 1,
            &invocation.name,
            false,
            None,
            &format!("error: not run: {reason}"),
        );
    }
    out.push_str("</tool_results>");
    out
}

fn push_entry(
    out: &mut String,
    index: usize,
    name: &str,
    succeeded: bool,
    exit_status: Option<i32>,
    body: &str,
) {
    out.push_str(&format!(
        "<tool_result index=\"{index}\" name=\"{}\" status=\"{}\"",
        attribute(name),
        if succeeded { "ok" } else { "error" }
    ));
    if let Some(code) = exit_status {
        out.push_str(&format!(" exit_status=\"{code}\""));
    }
    out.push_str(">\n");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</tool_result>\n");
}

fn result_body(result: &ToolResult) -> String {
    match result.error_message() {
        Some(message) if result.output.is_empty() => format!("error: {message}"),
        Some(message) => format!("error: {message}\n{}", result.output),
        None if result.output.is_empty() => EMPTY_OUTPUT.to_string(),
        None => result.output.clone(),
    }
}

fn attribute(value: &str) -> String {
    value.replace('"', "'")
}
