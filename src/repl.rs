//! One-shot and interactive front ends around the [`Agent`].
//!
//! Ctrl-C is captured process-wide and turned into the agent's cancel
//! signal: during a turn it interrupts the turn, at the idle prompt it exits.

use std::io::BufRead;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::agent::{Agent, Reply};
use crate::error::AgentError;
use crate::tools::{CancelSignal, BUILTIN_TOOLS};
use crate::ui::{parse_slash_command, RenderSink, Renderer, SlashCommandAction, SLASH_COMMANDS};

/// Process-wide Ctrl-C flag.
pub struct Interrupts {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Interrupts {
    /// Install the Ctrl-C listener. Requires a running tokio runtime.
    pub fn install() -> Self {
        let interrupts = Self::detached();
        let tx = interrupts.tx.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
                debug!("interrupt received");
                if tx.send(true).is_err() {
                    return;
                }
            }
        });
        interrupts
    }

    /// A flag nothing but [`Interrupts::trigger`] sets.
    pub fn detached() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal::new(self.rx.clone())
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }
}

/// Run a single prompt. Returns the process exit code.
pub async fn run_once(agent: &mut Agent, renderer: &Renderer, prompt: &str) -> i32 {
    match agent.send(prompt).await {
        Ok(Reply::Answered(_)) => 0,
        Ok(Reply::Cancelled) => {
            renderer.warn("interrupted");
            130
        }
        Err(e) => {
            renderer.error(&e.to_string());
            exit_code(&e)
        }
    }
}

fn exit_code(error: &AgentError) -> i32 {
    match error {
        AgentError::MaxIterationsReached { .. } => 2,
        AgentError::Config(_) | AgentError::Api(_) => 1,
    }
}

/// What the interactive loop should do after one line of input.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Read-eval loop until `/exit`, EOF or Ctrl-C at the prompt.
pub async fn run_interactive(agent: &mut Agent, renderer: &Renderer, interrupts: &Interrupts) {
    renderer.info("Type a request, /help for commands, Ctrl-D to exit.");
    loop {
        interrupts.clear();
        renderer.prompt();

        let cancel = interrupts.signal();
        let line = tokio::select! {
            line = read_line() => line,
            _ = cancel.cancelled() => {
                eprintln!();
                return;
            }
        };
        let Some(line) = line else {
            // EOF
            eprintln!();
            return;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(action) = parse_slash_command(input) {
            if handle_slash_command(agent, renderer, action) == Flow::Exit {
                return;
            }
            continue;
        }

        match agent.send(input).await {
            Ok(Reply::Answered(_)) => {}
            Ok(Reply::Cancelled) => renderer.warn("interrupted"),
            // The conversation stays usable; the user can retry.
            Err(e) => renderer.error(&e.to_string()),
        }
    }
}

/// Blocking stdin read on the blocking pool so Ctrl-C stays responsive.
async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}

fn handle_slash_command(
    agent: &mut Agent,
    renderer: &Renderer,
    action: SlashCommandAction,
) -> Flow {
    match action {
        SlashCommandAction::Help => {
            for cmd in SLASH_COMMANDS {
                renderer.info(&format!("  {:<10} {}", cmd.name, cmd.description));
            }
        }
        SlashCommandAction::Clear => {
            agent.reset();
            renderer.info("conversation cleared");
        }
        SlashCommandAction::Tools => {
            for spec in BUILTIN_TOOLS {
                renderer.info(&format!("  {:<8} {}", spec.display_name, spec.summary));
            }
            for (name, description) in agent.dispatcher().auxiliary_tools() {
                renderer.info(&format!("  {name}  {description}"));
            }
        }
        SlashCommandAction::Safe(value) => {
            if let Some(enabled) = value {
                agent.set_safe_mode(enabled);
            }
            renderer.info(&format!(
                "safe mode: {}",
                on_off(agent.dispatcher().policy().safe_mode)
            ));
        }
        SlashCommandAction::Approve(value) => {
            if let Some(enabled) = value {
                agent.set_auto_approve(enabled);
            }
            renderer.info(&format!(
                "auto-approve: {}",
                on_off(agent.dispatcher().policy().auto_approve)
            ));
        }
        SlashCommandAction::Quit => return Flow::Exit,
        SlashCommandAction::Usage(usage) => renderer.warn(&format!("usage: {usage}")),
        SlashCommandAction::Unknown(name) => {
            renderer.warn(&format!("unknown command {name}; try /help"))
        }
    }
    Flow::Continue
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
