use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use llm_relay::config::{AppConfig, LoggingSettings};
use llm_relay::server::{self, AppState};
use llm_relay::{Hub, HttpConnectorFactory, MemoryStore, Orchestrator};

/// Relay streaming LLM completions to WebSocket clients.
#[derive(Parser, Debug)]
#[command(name = "llm-relay", version, about)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./relay.toml when present)
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging, cli.verbose);

    let store = Arc::new(MemoryStore::from_seed(&config.seed).await);
    let hub = Hub::spawn(&config.hub);
    let factory = Arc::new(HttpConnectorFactory::new(config.generation.request_timeout()));
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        hub.clone(),
        factory,
        config.generation.clone(),
    ));

    let state = AppState::new(store, hub, orchestrator, config.auth.clone());
    let app = server::router(state);

    if config.auth.dev_mode {
        tracing::warn!(user_id = %config.auth.dev_user_id, "dev mode: every request is attributed to the dev user");
    }

    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(addr = %config.server.bind, "llm-relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings, verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
