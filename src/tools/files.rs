//! File executors: `read-file`, `write-file` and `edit-file`.

use std::path::Path;

use tracing::debug;

use super::aliases::{Param, ParameterAliases};
use super::confirm::Approval;
use super::{ToolInvocation, ToolResult};
use crate::error::ToolError;
use crate::textutil::{line_count, signed};

fn required<'a>(
    invocation: &'a ToolInvocation,
    aliases: &ParameterAliases,
    param: Param,
) -> Result<&'a str, ToolError> {
    aliases
        .lookup_trimmed(&invocation.parameters, param)
        .ok_or_else(|| {
            ToolError::InvalidArguments(format!(
                "missing required parameter `{}` (received: {})",
                param.canonical(),
                invocation.received_parameters()
            ))
        })
}

// ---------------------------------------------------------------------------
// read-file
// ---------------------------------------------------------------------------

/// Read a whole file. Empty files count as failures.
pub async fn read_file(
    invocation: &ToolInvocation,
    aliases: &ParameterAliases,
) -> Result<ToolResult, ToolError> {
    let path = required(invocation, aliases, Param::FilePath)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("cannot read {path}: {e}")))?;
    if bytes.is_empty() {
        return Err(ToolError::ExecutionFailed(format!("{path}: file is empty")));
    }
    debug!(path, bytes = bytes.len(), "read file");
    Ok(ToolResult::success(String::from_utf8_lossy(&bytes).into_owned()))
}

// ---------------------------------------------------------------------------
// write-file
// ---------------------------------------------------------------------------

/// Create or overwrite a file verbatim, creating parent directories.
pub async fn write_file(
    invocation: &ToolInvocation,
    aliases: &ParameterAliases,
    approval: &Approval<'_>,
) -> Result<ToolResult, ToolError> {
    let path = required(invocation, aliases, Param::FilePath)?;
    // Content is taken verbatim; an empty string is a legitimate write.
    let content = aliases
        .lookup(&invocation.parameters, Param::Content)
        .ok_or_else(|| {
            ToolError::InvalidArguments(format!(
                "missing required parameter `content` (received: {})",
                invocation.received_parameters()
            ))
        })?;

    let existing = match tokio::fs::read(path).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(ToolError::ExecutionFailed(format!("cannot read {path}: {e}")));
        }
    };
    let old_lines = existing.as_deref().map(line_count).unwrap_or(0);
    let new_lines = line_count(content);

    let description = match existing {
        Some(_) => format!("overwrite {path} ({old_lines} lines -> {new_lines} lines)"),
        None => format!("create {path} ({new_lines} lines)"),
    };
    approval.obtain(&description)?;

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("cannot write {path}: {e}")))?;

    let delta = new_lines as i64 - old_lines as i64;
    Ok(ToolResult::success(format!(
        "wrote {new_lines} lines to {path} (was {old_lines} lines, delta {})",
        signed(delta)
    )))
}

// ---------------------------------------------------------------------------
// edit-file
// ---------------------------------------------------------------------------

/// Replace every occurrence of `old_string`, after backing up the original.
pub async fn edit_file(
    invocation: &ToolInvocation,
    aliases: &ParameterAliases,
    backup_suffix: &str,
    approval: &Approval<'_>,
) -> Result<ToolResult, ToolError> {
    let path = required(invocation, aliases, Param::FilePath)?;
    let old = aliases
        .lookup(&invocation.parameters, Param::OldString)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ToolError::InvalidArguments(format!(
                "missing required parameter `old_string` (received: {})",
                invocation.received_parameters()
            ))
        })?;
    let new = aliases
        .lookup(&invocation.parameters, Param::NewString)
        .unwrap_or_default();
    if backup_suffix.is_empty() {
        return Err(ToolError::InvalidArguments(format!(
            "backup path for {path} would overwrite the file itself (empty backup suffix)"
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("cannot read {path}: {e}")))?;
    let original = String::from_utf8(bytes)
        .map_err(|_| ToolError::ExecutionFailed(format!("{path} is not valid UTF-8")))?;

    let occurrences = original.matches(old).count();
    if occurrences == 0 {
        return Err(ToolError::ExecutionFailed(format!(
            "old_string not found in {path}"
        )));
    }
    let updated = original.replace(old, new);
    let delta = line_count(&updated) as i64 - line_count(&original) as i64;

    approval.obtain(&edit_description(path, occurrences, old, new, delta))?;

    let backup = format!("{path}{backup_suffix}");
    tokio::fs::write(&backup, &original)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("cannot write backup {backup}: {e}")))?;
    tokio::fs::write(path, &updated)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("cannot write {path}: {e}")))?;
    debug!(path, occurrences, "edited file");

    Ok(ToolResult::success(format!(
        "replaced {occurrences} occurrence{} in {path} (backup: {backup}, delta {} lines)",
        if occurrences == 1 { "" } else { "s" },
        signed(delta)
    )))
}

fn edit_description(path: &str, occurrences: usize, old: &str, new: &str, delta: i64) -> String {
    let mut out = format!(
        "edit {path}: replace {occurrences} occurrence{} ({} lines)",
        if occurrences == 1 { "" } else { "s" },
        signed(delta)
    );
    for line in old.lines() {
        out.push_str("\n- ");
        out.push_str(line);
    }
    for line in new.lines() {
        out.push_str("\n+ ");
        out.push_str(line);
    }
    out
}
