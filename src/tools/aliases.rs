//! Accepted parameter spellings.
//!
//! Models name the same logical parameter differently (`file_path`, `path`,
//! `filename`, ...). Each list is tried in order and the first key present in
//! the invocation wins. Keys are compared with `-` folded to `_` and ASCII
//! case ignored.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Tunable alias table (`[tools.aliases]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParameterAliases {
    pub file_path: Vec<String>,
    pub command: Vec<String>,
    pub content: Vec<String>,
    pub old_string: Vec<String>,
    pub new_string: Vec<String>,
    pub pattern: Vec<String>,
    pub search_path: Vec<String>,
    pub mode: Vec<String>,
    pub timeout: Vec<String>,
    pub description: Vec<String>,
}

fn list(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ParameterAliases {
    fn default() -> Self {
        Self {
            file_path: list(&["file_path", "path", "filename", "file"]),
            command: list(&["command", "cmd"]),
            content: list(&["content", "contents", "text"]),
            old_string: list(&["old_string", "old_str", "old", "search"]),
            new_string: list(&["new_string", "new_str", "new", "replace", "replacement"]),
            pattern: list(&["pattern", "glob", "regex", "query"]),
            search_path: list(&["path", "directory", "dir", "root"]),
            mode: list(&["mode", "output_mode"]),
            timeout: list(&["timeout", "timeout_secs"]),
            description: list(&["description"]),
        }
    }
}

/// Logical parameters the built-in executors read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    FilePath,
    Command,
    Content,
    OldString,
    NewString,
    Pattern,
    SearchPath,
    Mode,
    Timeout,
    Description,
}

impl Param {
    /// Canonical spelling used in error messages and the system prompt.
    pub fn canonical(self) -> &'static str {
        match self {
            Self::FilePath => "file_path",
            Self::Command => "command",
            Self::Content => "content",
            Self::OldString => "old_string",
            Self::NewString => "new_string",
            Self::Pattern => "pattern",
            Self::SearchPath => "path",
            Self::Mode => "mode",
            Self::Timeout => "timeout",
            Self::Description => "description",
        }
    }
}

impl ParameterAliases {
    pub fn names(&self, param: Param) -> &[String] {
        match param {
            Param::FilePath => &self.file_path,
            Param::Command => &self.command,
            Param::Content => &self.content,
            Param::OldString => &self.old_string,
            Param::NewString => &self.new_string,
            Param::Pattern => &self.pattern,
            Param::SearchPath => &self.search_path,
            Param::Mode => &self.mode,
            Param::Timeout => &self.timeout,
            Param::Description => &self.description,
        }
    }

    /// First alias of `param` present in `params`, value untouched.
    pub fn lookup<'a>(
        &self,
        params: &'a BTreeMap<String, String>,
        param: Param,
    ) -> Option<&'a str> {
        let names = self.names(param);
        // Fall back to the canonical spelling if the table was emptied.
        let canonical = [param.canonical().to_string()];
        let names = if names.is_empty() { &canonical[..] } else { names };
        names.iter().find_map(|alias| {
            params
                .iter()
                .find(|(key, _)| same_key(key, alias))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Like [`lookup`](Self::lookup) but trimmed, with blank values treated as absent.
    pub fn lookup_trimmed<'a>(
        &self,
        params: &'a BTreeMap<String, String>,
        param: Param,
    ) -> Option<&'a str> {
        self.lookup(params, param)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn same_key(key: &str, alias: &str) -> bool {
    key.len() == alias.len()
        && key
            .bytes()
            .zip(alias.bytes())
            .all(|(a, b)| fold(a) == fold(b))
}

fn fold(byte: u8) -> u8 {
    if byte == b'-' {
        b'_'
    } else {
        byte.to_ascii_lowercase()
    }
}
