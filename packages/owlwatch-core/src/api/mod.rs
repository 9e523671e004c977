//! HTTP API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::bootstrap::BootstrappedServices;
use crate::services::{DeviceRegistry, DiscoveryScheduler, StatsCache, StreamProxy};
use crate::state::Config;

pub mod http;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative directory of discovered devices.
    pub registry: Arc<DeviceRegistry>,
    /// TTL cache over per-device telemetry.
    pub stats_cache: Arc<StatsCache>,
    /// Background subnet scan loop.
    pub scheduler: Arc<DiscoveryScheduler>,
    /// Per-session video proxy.
    pub stream_proxy: Arc<StreamProxy>,
    /// Engine configuration.
    pub config: Arc<RwLock<Config>>,
}

impl AppState {
    /// Builds the API state from bootstrapped services.
    pub fn new(services: &BootstrappedServices, config: Arc<RwLock<Config>>) -> Self {
        Self {
            registry: Arc::clone(&services.registry),
            stats_cache: Arc::clone(&services.stats_cache),
            scheduler: Arc::clone(&services.scheduler),
            stream_proxy: Arc::clone(&services.stream_proxy),
            config,
        }
    }
}

/// Starts the HTTP server on the configured port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let port = state.config.read().bind_port;
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("[Server] Listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(listener, app).await?;
    Ok(())
}
