//! Tool-call extraction from free-form model text.
//!
//! Models embed requests as tagged blocks:
//!
//! ```text
//! <tool_call>
//! <tool_name>Read</tool_name>
//! <parameters>
//! <file_path>src/main.rs</file_path>
//! </parameters>
//! </tool_call>
//! ```
//!
//! A block may hold several `<tool_name>`/`<parameters>` pairs and a response
//! may hold several blocks, optionally wrapped in `<tool_calls>`. The parser
//! is purely structural: it does not know tool names or parameter aliases,
//! and it never fails. Text outside blocks is returned as commentary.
//!
//! The first missing closing tag stops parsing. Invocations completed before
//! that point are kept and the raw unparsed tail is appended to commentary.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::ToolInvocation;

const BLOCK_OPEN: &str = "<tool_call>";
const BLOCK_CLOSE: &str = "</tool_call>";
const WRAPPER_OPEN: &str = "<tool_calls>";
const WRAPPER_CLOSE: &str = "</tool_calls>";
const NAME_OPEN: &str = "<tool_name>";
const NAME_CLOSE: &str = "</tool_name>";
const PARAMS_OPEN: &str = "<parameters>";
const PARAMS_CLOSE: &str = "</parameters>";

/// Invocations plus the prose meant for the human.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub invocations: Vec<ToolInvocation>,
    pub commentary: String,
}

impl ParsedResponse {
    pub fn has_invocations(&self) -> bool {
        !self.invocations.is_empty()
    }
}

/// Cheap pre-check before a full [`parse`].
pub fn contains_tool_call(text: &str) -> bool {
    text.contains(BLOCK_OPEN)
}

/// Split one model response into invocations and commentary.
pub fn parse(text: &str) -> ParsedResponse {
    let mut invocations = Vec::new();
    let mut commentary = Commentary::default();
    let mut rest = text;

    while let Some(start) = rest.find(BLOCK_OPEN) {
        commentary.push_prose(&rest[..start]);
        let block = &rest[start..];
        let body = &block[BLOCK_OPEN.len()..];
        match parse_block(body) {
            BlockOutcome::Complete { found, consumed } => {
                invocations.extend(found);
                rest = &body[consumed..];
            }
            BlockOutcome::Truncated {
                found,
                incomplete_at,
            } => {
                let raw = if found.is_empty() {
                    block
                } else {
                    &body[incomplete_at..]
                };
                warn!(
                    parsed = invocations.len() + found.len(),
                    "tool call block is missing a closing tag; keeping the unparsed tail as text"
                );
                invocations.extend(found);
                commentary.push_raw(raw);
                return ParsedResponse {
                    invocations,
                    commentary: commentary.finish(),
                };
            }
        }
    }
    commentary.push_prose(rest);

    ParsedResponse {
        invocations,
        commentary: commentary.finish(),
    }
}

#[derive(Default)]
struct Commentary {
    segments: Vec<String>,
}

impl Commentary {
    fn push_prose(&mut self, text: &str) {
        let cleaned = text.replace(WRAPPER_OPEN, "").replace(WRAPPER_CLOSE, "");
        self.push_raw(&cleaned);
    }

    fn push_raw(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.segments.push(trimmed.to_string());
        }
    }

    fn finish(self) -> String {
        self.segments.join("\n")
    }
}

enum BlockOutcome {
    /// `consumed` counts bytes of the body through `</tool_call>`.
    Complete {
        found: Vec<ToolInvocation>,
        consumed: usize,
    },
    /// `incomplete_at` is the body offset where parsing gave up.
    Truncated {
        found: Vec<ToolInvocation>,
        incomplete_at: usize,
    },
}

fn parse_block(body: &str) -> BlockOutcome {
    let mut found = Vec::new();
    let mut pos = 0;
    loop {
        pos = skip_whitespace(body, pos);
        let here = &body[pos..];
        if here.starts_with(BLOCK_CLOSE) {
            return BlockOutcome::Complete {
                found,
                consumed: pos + BLOCK_CLOSE.len(),
            };
        }
        if here.is_empty() && !found.is_empty() {
            // Only the block's own closing tag is missing.
            return BlockOutcome::Truncated {
                found,
                incomplete_at: pos,
            };
        }
        if here.starts_with(NAME_OPEN) {
            match parse_invocation(body, pos) {
                Some((invocation, next)) => {
                    if let Some(invocation) = invocation {
                        found.push(invocation);
                    }
                    pos = next;
                    continue;
                }
                None => {
                    return BlockOutcome::Truncated {
                        found,
                        incomplete_at: pos,
                    }
                }
            }
        }
        match find_first_tag(here, &[NAME_OPEN, BLOCK_CLOSE]) {
            Some(skip) => {
                debug!(skipped = skip, "ignoring stray text inside tool call block");
                pos += skip;
            }
            None => {
                return BlockOutcome::Truncated {
                    found,
                    incomplete_at: pos,
                }
            }
        }
    }
}

/// Parse `<tool_name>..</tool_name>[<parameters>..</parameters>]` at `pos`.
///
/// Returns `None` on a missing closing tag. An empty name yields no
/// invocation but still advances.
fn parse_invocation(body: &str, pos: usize) -> Option<(Option<ToolInvocation>, usize)> {
    let name_start = pos + NAME_OPEN.len();
    let name_len = body[name_start..].find(NAME_CLOSE)?;
    let name = body[name_start..name_start + name_len].trim();
    if name.contains('<') {
        // Our `</tool_name>` belongs to a later invocation.
        return None;
    }
    let mut next = name_start + name_len + NAME_CLOSE.len();

    let mut parameters = BTreeMap::new();
    let params_at = skip_whitespace(body, next);
    if body[params_at..].starts_with(PARAMS_OPEN) {
        next = parse_parameters(body, params_at + PARAMS_OPEN.len(), &mut parameters)?;
    }

    if name.is_empty() {
        warn!("dropping tool call with an empty tool name");
        return Some((None, next));
    }
    Some((
        Some(ToolInvocation {
            name: name.to_string(),
            parameters,
        }),
        next,
    ))
}

/// Accumulate `<key>value</key>` pairs until `</parameters>`. Last write wins.
fn parse_parameters(
    body: &str,
    mut pos: usize,
    parameters: &mut BTreeMap<String, String>,
) -> Option<usize> {
    loop {
        pos = skip_whitespace(body, pos);
        let here = &body[pos..];
        if here.starts_with(PARAMS_CLOSE) {
            return Some(pos + PARAMS_CLOSE.len());
        }
        let lt = here.find('<')?;
        pos += lt;
        let here = &body[pos..];
        if here.starts_with(PARAMS_CLOSE) {
            continue;
        }
        let gt = here.find('>')?;
        let inner = &here[1..gt];
        let after_tag = pos + gt + 1;

        if inner.starts_with('/') {
            // Stray closing tag.
            pos = after_tag;
            continue;
        }
        if let Some(self_closed) = inner.strip_suffix('/') {
            let (tag, key) = split_open_tag(self_closed);
            if !tag.is_empty() {
                parameters.insert(key.to_string(), String::new());
            }
            pos = after_tag;
            continue;
        }

        let (tag, key) = split_open_tag(inner);
        if tag.is_empty() {
            pos = after_tag;
            continue;
        }
        let close = format!("</{tag}>");
        let value_len = body[after_tag..].find(&close)?;
        let value = strip_leading_newline(&body[after_tag..after_tag + value_len]);
        parameters.insert(key.to_string(), value.to_string());
        pos = after_tag + value_len + close.len();
    }
}

/// Split `tag attr="..."` into the tag name and the parameter key.
///
/// `<parameter name="path">` style tags use the `name` attribute as the key.
fn split_open_tag(inner: &str) -> (&str, &str) {
    let inner = inner.trim();
    let tag = inner.split_whitespace().next().unwrap_or("");
    let attrs = &inner[tag.len()..];
    let key = name_attribute(attrs).unwrap_or(tag);
    (tag, key)
}

fn name_attribute(attrs: &str) -> Option<&str> {
    let start = attrs.find("name=")? + "name=".len();
    let rest = &attrs[start..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    let key = value[..end].trim();
    (!key.is_empty()).then_some(key)
}

fn strip_leading_newline(value: &str) -> &str {
    value
        .strip_prefix("\r\n")
        .or_else(|| value.strip_prefix('\n'))
        .unwrap_or(value)
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

fn find_first_tag(haystack: &str, tags: &[&str]) -> Option<usize> {
    tags.iter().filter_map(|tag| haystack.find(tag)).min()
}
