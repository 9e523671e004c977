//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. This pattern provides:
//!
//! - **Clarity**: All dependency relationships are visible in one place
//! - **Testability**: Easy to swap implementations for testing
//! - **Maintainability**: Service creation logic is isolated from usage

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{OwlError, OwlResult};
use crate::owl::client::HttpOwlClient;
use crate::owl::traits::{OwlTelemetry, OwlVideo};
use crate::secrets::CredentialProvider;
use crate::services::{
    DeviceRegistry, DiscoveryScheduler, RetryPolicy, SchedulerConfig, StatsCache, StreamProxy,
};
use crate::state::Config;

/// Container for all bootstrapped services.
#[derive(Clone, Debug)]
pub struct BootstrappedServices {
    /// Authoritative directory of discovered devices.
    pub registry: Arc<DeviceRegistry>,
    /// TTL cache over per-device telemetry.
    pub stats_cache: Arc<StatsCache>,
    /// Background subnet scan loop.
    pub scheduler: Arc<DiscoveryScheduler>,
    /// Per-session video proxy.
    pub stream_proxy: Arc<StreamProxy>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Starts the background scan loop.
    pub fn start_background_tasks(&self) {
        self.scheduler.start();
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.cancel_token.cancel();
        self.scheduler.stop().await;
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all engine services with their dependencies.
///
/// Wiring order follows the dependency graph: transport first, then the
/// registry and cache it feeds, then the scheduler and proxy on top.
///
/// # Errors
///
/// Returns [`OwlError::Configuration`] if the configuration fails
/// validation, credentials cannot be resolved, or the HTTP transport fails
/// to build. All of these are fatal at startup only.
pub fn bootstrap_services(
    config: &Config,
    credentials: &dyn CredentialProvider,
) -> OwlResult<BootstrappedServices> {
    config
        .validate()
        .map_err(OwlError::Configuration)?;

    let credentials = credentials
        .get_credentials()
        .map_err(|e| OwlError::Configuration(e.to_string()))?;

    let client = Arc::new(
        HttpOwlClient::new(credentials, config.fetch_timeout(), config.stream_timeout())
            .map_err(OwlError::Configuration)?,
    );

    let cancel_token = CancellationToken::new();

    let registry = Arc::new(DeviceRegistry::new(RetryPolicy {
        max_retries: config.max_retries,
        cooldown: config.retry_cooldown(),
    }));

    let stats_cache = Arc::new(StatsCache::new(
        Arc::clone(&client) as Arc<dyn OwlTelemetry>,
        config.cache_ttl(),
    ));

    let scheduler = Arc::new(DiscoveryScheduler::new(
        Arc::clone(&client) as Arc<dyn OwlTelemetry>,
        Arc::clone(&registry),
        Arc::clone(&stats_cache),
        SchedulerConfig::from_config(config),
        cancel_token.clone(),
    ));

    let stream_proxy = Arc::new(StreamProxy::new(
        Arc::clone(&client) as Arc<dyn OwlVideo>,
        Arc::clone(&registry),
    ));

    Ok(BootstrappedServices {
        registry,
        stats_cache,
        scheduler,
        stream_proxy,
        cancel_token,
    })
}
