//! Terminal-facing UI.
//!
//! `render` holds the [`RenderSink`] contract the agent loop reports
//! through, `commands` parses interactive slash commands and `markdown`
//! lays out model answers for the terminal.

pub mod commands;
pub mod markdown;
pub mod render;

pub use commands::{parse_slash_command, SlashCommand, SlashCommandAction, SLASH_COMMANDS};
pub use render::{RenderSink, Renderer};
