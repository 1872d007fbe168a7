//! Filesystem search executors: `find-files` (glob) and `search-content` (regex).
//!
//! Both walk synchronously on the blocking pool and cap their result count.
//! `find-files` expands patterns with `glob`; `search-content` walks the tree
//! with `ignore`'s walker.
//! No matches is a successful, empty result.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use ignore::WalkBuilder;
use regex::Regex;
use tracing::debug;

use super::aliases::{Param, ParameterAliases};
use super::{ToolInvocation, ToolResult};
use crate::error::ToolError;

/// Directories never descended into by content search.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Files larger than this are not searched.
const MAX_SEARCH_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// `search-content` output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    FilesOnly,
    Content,
}

impl SearchMode {
    fn parse(raw: Option<&str>) -> Result<Self, ToolError> {
        let Some(raw) = raw else {
            return Ok(Self::FilesOnly);
        };
        match raw.to_ascii_lowercase().replace('_', "-").as_str() {
            "files-only" | "files" | "files-with-matches" => Ok(Self::FilesOnly),
            "content" | "lines" => Ok(Self::Content),
            other => Err(ToolError::InvalidArguments(format!(
                "unknown mode `{other}`: expected files-only or content"
            ))),
        }
    }
}

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
// find-files
// ---------------------------------------------------------------------------

pub async fn find_files(
    invocation: &ToolInvocation,
    aliases: &ParameterAliases,
    max_results: usize,
) -> Result<ToolResult, ToolError> {
    let pattern = required(invocation, aliases, Param::Pattern)?.to_string();
    let base = aliases
        .lookup_trimmed(&invocation.parameters, Param::SearchPath)
        .unwrap_or(".")
        .to_string();
    tokio::task::spawn_blocking(move || find_files_blocking(&pattern, &base, max_results))
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("search task failed: {e}")))?
}

fn full_glob_pattern(pattern: &str, base: &str) -> String {
    if pattern.starts_with('/') {
        return pattern.to_string();
    }
    let base = Pattern::escape(base.trim_end_matches('/'));
    let base = if base.is_empty() { "/".to_string() } else { base };
    let pattern = pattern.trim_start_matches("./");
    if pattern.contains('/') || pattern.starts_with("**") {
        format!("{base}/{pattern}")
    } else {
        format!("{base}/**/{pattern}")
    }
}

fn find_files_blocking(
    pattern: &str,
    base: &str,
    max_results: usize,
) -> Result<ToolResult, ToolError> {
    let full = full_glob_pattern(pattern, base);
    debug!(pattern = %full, "glob search");
    let entries = glob(&full).map_err(|e| {
        ToolError::InvalidArguments(format!("invalid glob pattern `{pattern}`: {e}"))
    })?;

    let mut matches = Vec::new();
    let mut limited = false;
    for path in entries.flatten() {
        if !path.is_file() || in_skipped_dir(&path, Path::new(base)) {
            continue;
        }
        if matches.len() >= max_results {
            limited = true;
            break;
        }
        matches.push(display_path(&path));
    }
    matches.sort();

    if matches.is_empty() {
        return Ok(ToolResult::success("no files matched"));
    }
    let mut output = matches.join("\n");
    if limited {
        output.push_str(&format!("\n... (limited to {max_results} results)"));
    }
    Ok(ToolResult::success(output))
}

// ---------------------------------------------------------------------------
// search-content
// ---------------------------------------------------------------------------

pub async fn search_content(
    invocation: &ToolInvocation,
    aliases: &ParameterAliases,
    max_results: usize,
) -> Result<ToolResult, ToolError> {
    let pattern = required(invocation, aliases, Param::Pattern)?.to_string();
    let root = aliases
        .lookup_trimmed(&invocation.parameters, Param::SearchPath)
        .unwrap_or(".")
        .to_string();
    let mode = SearchMode::parse(aliases.lookup_trimmed(&invocation.parameters, Param::Mode))?;
    tokio::task::spawn_blocking(move || search_content_blocking(&pattern, &root, mode, max_results))
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("search task failed: {e}")))?
}

fn search_content_blocking(
    pattern: &str,
    root: &str,
    mode: SearchMode,
    max_results: usize,
) -> Result<ToolResult, ToolError> {
    let (regex, literal) = match Regex::new(pattern) {
        Ok(regex) => (regex, false),
        Err(_) => {
            let escaped = Regex::new(&regex::escape(pattern)).map_err(|e| {
                ToolError::InvalidArguments(format!("invalid search pattern `{pattern}`: {e}"))
            })?;
            (escaped, true)
        }
    };

    let root_path = Path::new(root);
    if !root_path.exists() {
        return Err(ToolError::ExecutionFailed(format!("path not found: {root}")));
    }
    let files = collect_files(root_path);
    debug!(pattern, files = files.len(), ?mode, "content search");

    let mut results = Vec::new();
    let mut limited = false;
    'files: for file in files {
        let Some(content) = read_searchable(&file) else {
            continue;
        };
        let shown = display_path(&file);
        for (idx, line) in content.lines().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            if results.len() >= max_results {
                limited = true;
                break 'files;
            }
            match mode {
                SearchMode::FilesOnly => {
                    results.push(shown.clone());
                    continue 'files;
                }
                SearchMode::Content => results.push(format!("{shown}:{}: {line}", idx + 1)),
            }
        }
    }

    let mut output = if results.is_empty() {
        "no matches".to_string()
    } else {
        results.join("\n")
    };
    if limited {
        output.push_str(&format!("\n... (limited to {max_results} results)"));
    }
    if literal {
        output.push_str("\n(pattern is not a valid regex; searched as literal text)");
    }
    Ok(ToolResult::success(output))
}

/// All regular files under `root` in a stable order, skipping noise dirs.
///
/// Ignore files are not consulted: the model asked for this tree, and the
/// fixed skip list is the only filter.
fn collect_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_name(entry.path()))
        .build();
    let mut files: Vec<PathBuf> = walker
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn read_searchable(path: &Path) -> Option<String> {
    let metadata = fs::metadata(path).ok()?;
    if metadata.len() > MAX_SEARCH_FILE_SIZE {
        return None;
    }
    fs::read_to_string(path).ok()
}

fn is_skipped_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Only components below `base` count, so a checkout under `~/target/` still works.
fn in_skipped_dir(path: &Path, base: &Path) -> bool {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
    })
}

fn display_path(path: &Path) -> String {
    let shown = path.display().to_string();
    match shown.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => shown,
    }
}
