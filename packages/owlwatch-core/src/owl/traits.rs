//! Trait abstractions for OWL device transport.
//!
//! These traits enable dependency injection for testability and modularity.
//! Services depend on traits rather than concrete implementations.

use async_trait::async_trait;

use crate::owl::client::{TelemetryResult, VideoUpstream};
use crate::owl::types::{DeviceAddress, StatsPayload};

/// Trait for fetching telemetry from a device's stats endpoint.
///
/// Used by the discovery scheduler and the stats cache.
#[async_trait]
pub trait OwlTelemetry: Send + Sync {
    /// Issues one authenticated `GET /system_stats` against the device.
    ///
    /// Failures (timeout, refused, non-2xx, malformed payload) are returned,
    /// never raised past the caller - retry policy belongs to the scheduler.
    async fn fetch_stats(&self, address: &DeviceAddress) -> TelemetryResult<StatsPayload>;
}

/// Trait for opening a device's live video feed.
///
/// Used by the stream proxy.
#[async_trait]
pub trait OwlVideo: Send + Sync {
    /// Opens `GET /video_feed` and returns the upstream's chunk stream.
    ///
    /// The bounded timeout covers connection and response headers only;
    /// a healthy live feed is indefinitely long.
    async fn open_video(&self, address: &DeviceAddress) -> TelemetryResult<VideoUpstream>;
}
