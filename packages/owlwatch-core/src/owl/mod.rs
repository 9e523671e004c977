//! OWL device transport and domain types.

pub mod client;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ChunkStream, HttpOwlClient, TelemetryError, TelemetryResult, VideoUpstream};
pub use traits::{OwlTelemetry, OwlVideo};
pub use types::{
    DeviceAddress, DeviceId, DeviceRecord, DeviceScheme, DeviceStatus, StatsPayload, StatsReport,
    Telemetry,
};
