//! CLI entry point for loco.

mod cli;

use std::sync::Arc;

use clap::Parser;
use loco::agent::Agent;
use loco::api::ApiClient;
use loco::config::{
    initialize_default_global_config, load_config_with_source, validate, Config,
    GlobalConfigInitResult,
};
use loco::mcp::McpManager;
use loco::repl::{run_interactive, run_once, Interrupts};
use loco::tools::confirm::TerminalConfirmer;
use loco::tools::dispatch::Dispatcher;
use loco::tools::policy::SafetyPolicy;
use loco::ui::{RenderSink, Renderer};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "LOCO_LOG";

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    if let Some(cli::Command::Init { force }) = args.command {
        std::process::exit(run_init(force));
    }

    let loaded = match load_config_with_source(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    match &loaded.source {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => info!("no config file found; using defaults"),
    }
    let mut config = loaded.config;
    apply_cli_overrides(&mut config, &args);

    let renderer = Renderer::new(config.display.color, config.display.show_tool_calls);
    if let Err(e) = validate(&config) {
        renderer.error(&e.to_string());
        std::process::exit(1);
    }

    let mut dispatcher = Dispatcher::new(
        config.tools.clone(),
        SafetyPolicy::from_config(&config.safety),
        Arc::new(TerminalConfirmer::new(config.display.color)),
    );
    if !args.no_mcp && !config.mcp.servers.is_empty() {
        let manager = McpManager::start(&config.mcp).await;
        if manager.is_empty() {
            renderer.warn("no MCP server could be started");
        } else {
            debug!(servers = ?manager.server_names(), "mcp servers running");
            dispatcher = dispatcher.with_auxiliary(Arc::new(manager));
        }
    }

    let client = Arc::new(ApiClient::new(&config.model));
    let mut agent = Agent::new(&config, client, dispatcher, Arc::new(renderer));
    let interrupts = Interrupts::install();
    agent.set_cancel_signal(interrupts.signal());

    let code = match args.prompt.as_deref() {
        Some(prompt) => run_once(&mut agent, &renderer, prompt).await,
        None => {
            renderer.header(&config.model.name, &config.model.base_url);
            run_interactive(&mut agent, &renderer, &interrupts).await;
            0
        }
    };
    // Exit explicitly: a pending stdin read on the blocking pool would
    // otherwise hold the runtime open.
    std::process::exit(code);
}

/// `LOCO_LOG` wins; otherwise `-v` raises the default `warn` level.
fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_init(force: bool) -> i32 {
    match initialize_default_global_config(force) {
        Ok(GlobalConfigInitResult::Created { path }) => {
            println!("wrote {}", path.display());
            0
        }
        Ok(GlobalConfigInitResult::AlreadyInitialized { path }) => {
            println!(
                "{} already exists; use `loco init --force` to overwrite",
                path.display()
            );
            0
        }
        Ok(GlobalConfigInitResult::Overwritten { path, backup_path }) => {
            println!(
                "wrote {} (previous config saved to {})",
                path.display(),
                backup_path.display()
            );
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn apply_cli_overrides(config: &mut Config, args: &cli::Args) {
    if let Some(model) = &args.model {
        config.model.name = model.clone();
    }
    if let Some(url) = &args.base_url {
        config.model.base_url = url.clone();
    }
    if let Some(temperature) = args.temperature {
        config.model.temperature = Some(temperature);
    }
    if let Some(max) = args.max_iterations {
        config.agent.max_tool_iterations = max;
    }
    if args.yes {
        config.safety.auto_approve = true;
    }
    if args.unsafe_mode {
        config.safety.safe_mode = false;
    }
    if args.no_color {
        config.display.color = false;
    }
}
