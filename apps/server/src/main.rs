//! Owlwatch Server - headless discovery and monitoring daemon.
//!
//! Scans the configured subnet for OWL camera units, tracks their health
//! telemetry, and serves the device directory plus proxied video feeds
//! over HTTP for the dashboard front-end.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use owlwatch_core::{
    bootstrap_services, start_server, AppState, CredentialProvider, EnvCredentialProvider,
    StaticCredentialProvider,
};
use parking_lot::RwLock;
use tokio::signal;

use crate::config::ServerConfig;

/// Owlwatch Server - OWL fleet discovery, monitoring and video proxying.
#[derive(Parser, Debug)]
#[command(name = "owlwatch-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "OWLWATCH_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "OWLWATCH_BIND_PORT")]
    port: Option<u16>,

    /// Subnet prefix to scan, e.g. "192.168.1" (overrides config file).
    #[arg(short = 's', long, env = "OWLWATCH_SUBNET")]
    subnet: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Owlwatch Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(subnet) = args.subnet {
        config.subnet = subnet;
    }

    log::info!(
        "Configuration: bind_port={}, subnet={}, scan_interval={}s",
        config.bind_port,
        config.subnet,
        config.scan_interval_secs
    );

    // Credentials from the config file when present, otherwise from
    // OWLWATCH_USERNAME / OWLWATCH_PASSWORD.
    let credentials: Box<dyn CredentialProvider> = match config.credentials.clone() {
        Some(creds) => Box::new(StaticCredentialProvider::new(creds)),
        None => Box::new(EnvCredentialProvider),
    };

    // Bootstrap the engine; configuration problems are fatal here and
    // nowhere else.
    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config, credentials.as_ref())
        .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // Start the discovery scan loop
    services.start_background_tasks();

    // Build app state for the HTTP server
    let app_state = AppState::new(&services, Arc::new(RwLock::new(core_config)));

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("HTTP server started on port {}", config.bind_port);

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown: stop the scan loop, then drop the server task.
    services.shutdown().await;
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
