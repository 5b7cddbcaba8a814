//! Search-engine sidecar
//!
//! HTTP server fronting the compiled-in search engines.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sidecar_host::config::Config;
use sidecar_host::state::AppState;
use sidecar_host::{boundary, builtin_catalog, cli, routes};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// List the manifest's engines and check that each can be loaded.
    Engines,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();
    boundary::install_panic_hook();

    let args = Args::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, manifest = %config.manifest_path.display(), "Configuration loaded");

    let state = AppState::new(&config, builtin_catalog())
        .context("failed to initialize application state")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, state).await,
        Command::Engines => cli::cmd_engines(&state),
    }
}

async fn serve(config: &Config, state: AppState) -> Result<()> {
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
