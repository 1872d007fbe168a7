//! CLI argument parsing via clap.

use clap::{ArgAction, Parser, Subcommand};

/// A local-first coding agent for the terminal. Talks to any
/// OpenAI-compatible model server (Ollama, LM Studio, llama.cpp).
#[derive(Debug, Parser)]
#[command(name = "loco", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Prompt to send. If provided, runs in one-shot mode and exits.
    pub prompt: Option<String>,

    /// Path to config file (default: ./loco.toml or ~/.config/loco/loco.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Override model name.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Override sampling temperature.
    #[arg(short = 't', long = "temperature")]
    pub temperature: Option<f64>,

    /// Override the model server base URL.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Approve every confirmation prompt automatically.
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Disable safe mode (the shell command allowlist).
    #[arg(long = "unsafe")]
    pub unsafe_mode: bool,

    /// Override the per-message tool iteration cap.
    #[arg(long = "max-iterations")]
    pub max_iterations: Option<usize>,

    /// Do not start configured MCP servers.
    #[arg(long = "no-mcp")]
    pub no_mcp: bool,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// More log output on stderr (-v info, -vv debug).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Write the default config to ~/.config/loco/loco.toml.
    Init {
        /// Overwrite an existing config (a timestamped backup is kept).
        #[arg(long)]
        force: bool,
    },
}
