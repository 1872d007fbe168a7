//! Shared UTF-8-safe truncation and line-count helpers.
//!
//! Tool output is truncated to a byte budget before it is folded back into
//! the conversation. Byte slicing directly can panic when the cut falls
//! inside a multi-byte character; these helpers centralize safe behavior.

/// Return a UTF-8-safe prefix whose byte length is at most `max_bytes`.
pub fn safe_prefix_by_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Truncate by bytes and append `suffix` when truncation occurs.
pub fn truncate_with_suffix_by_bytes(text: &str, max_bytes: usize, suffix: &str) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let prefix = safe_prefix_by_bytes(text, max_bytes);
    format!("{prefix}{suffix}")
}

/// Truncate by characters and append `suffix` when truncation occurs.
pub fn truncate_with_suffix_by_chars(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let prefix: String = text.chars().take(max_chars).collect();
    format!("{prefix}{suffix}")
}

/// Number of lines, where a trailing newline does not start a new line.
pub fn line_count(text: &str) -> usize {
    text.lines().count()
}

/// Format with an explicit sign: `+2`, `-1`, `+0`.
pub fn signed(value: i64) -> String {
    format!("{value:+}")
}
