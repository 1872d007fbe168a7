//! Slash-command metadata and parsing.

/// Static slash command metadata used by parsing and `/help`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlashCommand {
    pub name: &'static str,
    pub description: &'static str,
}

/// Built-in slash commands for interactive mode.
pub const SLASH_COMMANDS: [SlashCommand; 8] = [
    SlashCommand {
        name: "/help",
        description: "List available slash commands.",
    },
    SlashCommand {
        name: "/clear",
        description: "Forget the conversation and start over.",
    },
    SlashCommand {
        name: "/tools",
        description: "List built-in and external tools.",
    },
    SlashCommand {
        name: "/safe",
        description: "Safe mode (shell allowlist): /safe on|off.",
    },
    SlashCommand {
        name: "/approve",
        description: "Auto-approve confirmations: /approve on|off.",
    },
    SlashCommand {
        name: "/exit",
        description: "Exit interactive mode.",
    },
    SlashCommand {
        name: "/quit",
        description: "Exit interactive mode.",
    },
    SlashCommand {
        name: "/q",
        description: "Short alias for exit.",
    },
];

/// Parsed slash command actions consumed by the interactive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommandAction {
    Help,
    Clear,
    Tools,
    /// `None` shows the current setting.
    Safe(Option<bool>),
    Approve(Option<bool>),
    Quit,
    /// Known command with an argument it does not accept.
    Usage(&'static str),
    Unknown(String),
}

/// Parse a slash command from user input.
///
/// Returns `None` if the input is not a slash command.
pub fn parse_slash_command(input: &str) -> Option<SlashCommandAction> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut words = trimmed.split_whitespace();
    let token = words.next().unwrap_or("").to_ascii_lowercase();
    let arg = words.next();

    let action = match token.as_str() {
        "/" | "/help" => SlashCommandAction::Help,
        "/clear" => SlashCommandAction::Clear,
        "/tools" => SlashCommandAction::Tools,
        "/safe" => match parse_switch(arg) {
            Ok(value) => SlashCommandAction::Safe(value),
            Err(()) => SlashCommandAction::Usage("/safe on|off"),
        },
        "/approve" => match parse_switch(arg) {
            Ok(value) => SlashCommandAction::Approve(value),
            Err(()) => SlashCommandAction::Usage("/approve on|off"),
        },
        "/quit" | "/exit" | "/q" => SlashCommandAction::Quit,
        other => SlashCommandAction::Unknown(other.to_string()),
    };

    Some(action)
}

fn parse_switch(arg: Option<&str>) -> Result<Option<bool>, ()> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(Some(true)),
        "off" | "false" | "no" | "0" => Ok(Some(false)),
        _ => Err(()),
    }
}
