//! loco: a local-first coding agent for OpenAI-compatible model servers.
//!
//! The model asks for tools with tagged markup in its reply text. The
//! [`agent::Agent`] parses those calls, gates each one through the safety
//! policy, runs them in order and feeds the results back until the model
//! answers without tool calls or the per-message iteration cap is reached.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use loco::agent::{Agent, Reply};
//! use loco::api::ApiClient;
//! use loco::config::load_config;
//! use loco::tools::confirm::TerminalConfirmer;
//! use loco::tools::dispatch::Dispatcher;
//! use loco::tools::policy::SafetyPolicy;
//! use loco::ui::Renderer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let dispatcher = Dispatcher::new(
//!     config.tools.clone(),
//!     SafetyPolicy::from_config(&config.safety),
//!     Arc::new(TerminalConfirmer::new(true)),
//! );
//! let client = Arc::new(ApiClient::new(&config.model));
//! let renderer = Arc::new(Renderer::new(true, true));
//! let mut agent = Agent::new(&config, client, dispatcher, renderer);
//! if let Reply::Answered(text) = agent.send("What does src/main.rs do?").await? {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prompt;
pub mod repl;
#[cfg(test)]
pub mod testsupport;
pub mod textutil;
pub mod tools;
pub mod types;
pub mod ui;
