//! Domain types for OWL devices.
//!
//! These model the device directory entries and the telemetry shapes that
//! flow between the transport, the registry, and the API layer.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Identity & Addressing
// ─────────────────────────────────────────────────────────────────────────────

/// Stable identifier for a discovered OWL unit.
///
/// Identity policy: the self-reported `owl_id` from the telemetry payload
/// wins when present and non-empty; otherwise the id is derived from the
/// address's host suffix as `owl-<suffix>`. A device that later starts
/// reporting an `owl_id` appears under the new id and its suffix-keyed
/// record ages out through the staleness sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the fallback id for an address with no self-reported `owl_id`.
    pub fn from_suffix(suffix: u8) -> Self {
        Self(format!("owl-{}", suffix))
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport scheme for device endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceScheme {
    Http,
    Https,
}

impl DeviceScheme {
    /// Returns the scheme as a URL prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Network location of an OWL device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    /// Transport scheme for the device's endpoints.
    pub scheme: DeviceScheme,
    /// IPv4 address on the scanned subnet.
    pub ip: Ipv4Addr,
    /// Explicit port; `None` uses the scheme default.
    pub port: Option<u16>,
}

impl DeviceAddress {
    /// Creates a new address.
    pub fn new(scheme: DeviceScheme, ip: Ipv4Addr, port: Option<u16>) -> Self {
        Self { scheme, ip, port }
    }

    /// Base URL without a trailing slash (e.g. `https://192.168.1.37`).
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme.as_str(), self.ip, port),
            None => format!("{}://{}", self.scheme.as_str(), self.ip),
        }
    }

    /// URL of the device's telemetry endpoint.
    pub fn stats_url(&self) -> String {
        format!("{}/system_stats", self.base_url())
    }

    /// URL of the device's video endpoint.
    pub fn video_url(&self) -> String {
        format!("{}/video_feed", self.base_url())
    }

    /// The host octet, used for fallback device-id derivation.
    pub fn host_suffix(&self) -> u8 {
        self.ip.octets()[3]
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.base_url())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness classification of a device record or stats report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Connected,
    Disconnected,
    Error,
}

/// Wire shape of the device's `GET /system_stats` response.
///
/// All fields are optional on the wire; missing numerics default to zero so a
/// sparse payload from older firmware still parses.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsPayload {
    #[serde(default)]
    pub cpu_temp: f64,
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub detecting: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub owl_id: Option<String>,
}

/// Last-known-good telemetry for a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    /// CPU temperature in degrees Celsius.
    pub cpu_temperature: f64,
    /// CPU load as a percentage (0-100).
    pub cpu_load_percent: f64,
    /// Whether the device's detection pipeline is active.
    pub detecting: bool,
    /// Device-reported error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&StatsPayload> for Telemetry {
    fn from(payload: &StatsPayload) -> Self {
        Self {
            cpu_temperature: payload.cpu_temp,
            cpu_load_percent: payload.cpu_percent,
            detecting: payload.detecting,
            error: payload.error.clone(),
        }
    }
}

/// One entry in the device directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Stable identifier for the device.
    pub device_id: DeviceId,
    /// Network location of the device's endpoints.
    pub address: DeviceAddress,
    /// Liveness classification.
    pub status: DeviceStatus,
    /// Last successful contact, as Unix epoch milliseconds.
    pub last_seen_ms: u64,
    /// Telemetry from the last successful contact.
    pub telemetry: Telemetry,
}

/// Query-path shape returned by the stats cache.
///
/// Unlike [`Telemetry`] this carries a status so stale-but-cached data can be
/// served annotated with the failure that made it stale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Whether this report came from a live fetch or a failed one.
    pub status: DeviceStatus,
    pub cpu_temperature: f64,
    pub cpu_load_percent: f64,
    pub detecting: bool,
    /// Failure reason when `status` is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatsReport {
    /// Builds a report from freshly fetched (or fresh-enough cached) telemetry.
    pub fn connected(telemetry: Telemetry) -> Self {
        Self {
            status: DeviceStatus::Connected,
            cpu_temperature: telemetry.cpu_temperature,
            cpu_load_percent: telemetry.cpu_load_percent,
            detecting: telemetry.detecting,
            error: telemetry.error,
        }
    }

    /// Builds an error-annotated report from stale or zero-value telemetry.
    pub fn unreachable(telemetry: Telemetry, reason: String) -> Self {
        Self {
            status: DeviceStatus::Error,
            cpu_temperature: telemetry.cpu_temperature,
            cpu_load_percent: telemetry.cpu_load_percent,
            detecting: telemetry.detecting,
            error: Some(reason),
        }
    }
}
