//! Markdown-to-terminal rendering helpers.
//!
//! We use `termimad` because it produces terminal-friendly markdown layout
//! (lists, headings, code fences, blockquotes, tables) without requiring a
//! full TUI markdown view.

use termimad::MadSkin;

/// Render markdown into plain terminal text with structure preserved.
///
/// The output contains no ANSI styling; the renderer decides on colors.
pub fn render_markdown_for_terminal(input: &str) -> String {
    let skin = MadSkin::no_style();
    let formatted = skin.text(input, None).to_string();
    formatted.trim_end_matches('\n').to_string()
}
