//! # pushbench
//!
//! Binary entry point: loads settings, starts logging and serves the SSE and
//! WebSocket endpoints until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pushbench_server::{load_settings_from_path, PushServer};

/// SSE vs WebSocket push comparison server.
#[derive(Parser, Debug)]
#[command(name = "pushbench", version, about)]
struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long, env = "PUSHBENCH_CONFIG", default_value = "pushbench.json")]
    config: PathBuf,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings_from_path(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }

    pushbench_telemetry::init_telemetry(&settings.telemetry_config())
        .context("failed to initialize logging")?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "starting pushbench"
    );

    let bind = settings.bind_addr();
    let handle = PushServer::new(settings)
        .listen()
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr = %handle.local_addr(), "health check: /health");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    handle.shutdown().await;
    Ok(())
}
