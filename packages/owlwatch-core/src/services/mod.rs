//! Engine services layer.
//!
//! This module contains the business logic services that sit between the
//! API layer and the device transport (owl/).

pub mod registry;
pub mod scheduler;
pub mod stats_cache;
pub mod stream_proxy;

pub use registry::{DeviceRegistry, RetryPolicy};
pub use scheduler::{derive_device_id, DiscoveryScheduler, SchedulerConfig};
pub use stats_cache::StatsCache;
pub use stream_proxy::{ProxiedStream, StreamProxy};
