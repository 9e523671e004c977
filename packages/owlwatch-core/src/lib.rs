//! Owlwatch Core - discovery and monitoring engine for OWL camera units.
//!
//! This crate discovers networked OWL devices on a local subnet, monitors
//! their health telemetry, and proxies their live video streams. It is
//! designed to be embedded by a thin HTTP front-end; the engine owns all
//! state-machine and concurrency behavior.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`owl`]: device transport (HTTP client, trait seams) and domain types
//! - [`services`]: registry, stats cache, discovery scheduler, stream proxy
//! - [`state`]: engine configuration and scan range
//! - [`secrets`]: credential provider seam for device Basic Auth
//! - [`bootstrap`]: composition root wiring all services together
//! - [`api`]: thin axum handlers over the services
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! Services depend on [`OwlTelemetry`](owl::OwlTelemetry) and
//! [`OwlVideo`](owl::OwlVideo) rather than the concrete HTTP client, so
//! tests run over scripted in-memory transports.

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod error;
pub mod owl;
pub mod secrets;
pub mod services;
pub mod state;

// Re-export commonly used types at the crate root
pub use error::{ErrorCode, OwlError, OwlResult};
pub use state::{Config, ScanRange};

// Re-export device types
pub use owl::{
    DeviceAddress, DeviceId, DeviceRecord, DeviceScheme, DeviceStatus, HttpOwlClient,
    OwlTelemetry, OwlVideo, StatsPayload, StatsReport, Telemetry, TelemetryError,
};

// Re-export service types
pub use services::{
    derive_device_id, DeviceRegistry, DiscoveryScheduler, ProxiedStream, RetryPolicy,
    SchedulerConfig, StatsCache, StreamProxy,
};

// Re-export secret-provider types
pub use secrets::{
    CredentialError, CredentialProvider, Credentials, EnvCredentialProvider,
    StaticCredentialProvider,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
