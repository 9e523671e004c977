//! Core configuration and scan range types.
//!
//! [`Config`] holds every tunable the engine recognizes, with defaults that
//! match a typical home-lab OWL deployment. [`ScanRange`] describes the slice
//! of a /24 subnet that the discovery scheduler enumerates each pass.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::owl::types::{DeviceAddress, DeviceScheme};

/// Slice of a /24 subnet to probe for OWL devices.
///
/// `subnet` is the dotted prefix without the host octet (e.g. `"192.168.1"`);
/// host suffixes `first_host..=last_host` are enumerated in order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ScanRange {
    /// Dotted /24 prefix, three octets (e.g. "192.168.1").
    pub subnet: String,

    /// First host suffix to probe (inclusive).
    pub first_host: u8,

    /// Last host suffix to probe (inclusive).
    pub last_host: u8,
}

impl ScanRange {
    /// Creates a new `ScanRange` with validated values.
    ///
    /// # Errors
    ///
    /// Returns an error if the subnet prefix or host window is invalid.
    pub fn new(subnet: impl Into<String>, first_host: u8, last_host: u8) -> Result<Self, String> {
        let range = Self {
            subnet: subnet.into(),
            first_host,
            last_host,
        };
        range.validate()?;
        Ok(range)
    }

    /// Validates the subnet prefix and host window.
    pub fn validate(&self) -> Result<(), String> {
        if self.subnet.is_empty() {
            return Err("subnet must not be empty".to_string());
        }
        if format!("{}.1", self.subnet).parse::<Ipv4Addr>().is_err() {
            return Err(format!(
                "subnet must be a dotted /24 prefix like \"192.168.1\", got \"{}\"",
                self.subnet
            ));
        }
        if self.first_host == 0 {
            return Err("first_host must be >= 1".to_string());
        }
        if self.last_host == 255 {
            return Err("last_host must be <= 254 (255 is the broadcast address)".to_string());
        }
        if self.first_host > self.last_host {
            return Err(format!(
                "first_host ({}) must be <= last_host ({})",
                self.first_host, self.last_host
            ));
        }
        Ok(())
    }

    /// Enumerates every candidate host address in the range, in suffix order.
    ///
    /// The subnet prefix must already be validated; unparseable entries are
    /// silently skipped rather than panicking mid-scan.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (self.first_host..=self.last_host)
            .filter_map(|suffix| format!("{}.{}", self.subnet, suffix).parse().ok())
    }

    /// Builds the [`DeviceAddress`] list for one scan pass.
    pub fn addresses(&self, scheme: DeviceScheme, port: Option<u16>) -> Vec<DeviceAddress> {
        self.hosts()
            .map(|ip| DeviceAddress::new(scheme, ip, port))
            .collect()
    }
}

impl Default for ScanRange {
    fn default() -> Self {
        Self {
            subnet: "192.168.1".to_string(),
            first_host: 2,
            last_host: 254,
        }
    }
}

/// Configuration for the Owlwatch engine.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    // Server
    /// Port for the HTTP API server.
    pub bind_port: u16,

    // Discovery
    /// Subnet slice scanned for OWL devices.
    #[serde(default)]
    pub scan_range: ScanRange,

    /// Scheme used for device endpoints (OWL fleet serves self-signed HTTPS).
    pub device_scheme: DeviceScheme,

    /// Explicit device port; `None` uses the scheme default.
    pub device_port: Option<u16>,

    /// Interval between scan passes (seconds).
    pub scan_interval_secs: u64,

    /// Maximum in-flight telemetry fetches per scan pass.
    pub scan_concurrency: usize,

    // Timeouts
    /// Per-request budget for a telemetry fetch (seconds).
    pub fetch_timeout_secs: u64,

    /// Connect/header budget for opening a video stream (seconds).
    pub stream_timeout_secs: u64,

    // Failure policy
    /// Consecutive failures before an address enters cooldown.
    pub max_retries: u32,

    /// How long a cooled-down address is skipped before retrying (seconds).
    pub retry_cooldown_secs: u64,

    /// Age since last successful contact after which a device is evicted (seconds).
    pub staleness_threshold_secs: u64,

    // Stats cache
    /// How long a cached telemetry payload is served without a fresh fetch (seconds).
    pub cache_ttl_secs: u64,
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.scan_range.validate()?;
        if self.scan_interval_secs == 0 {
            return Err("scan_interval_secs must be >= 1".to_string());
        }
        if self.scan_concurrency == 0 {
            return Err("scan_concurrency must be >= 1".to_string());
        }
        if self.fetch_timeout_secs == 0 {
            return Err("fetch_timeout_secs must be >= 1".to_string());
        }
        if self.stream_timeout_secs == 0 {
            return Err("stream_timeout_secs must be >= 1".to_string());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be >= 1".to_string());
        }
        Ok(())
    }

    /// Scan pass cadence.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Telemetry fetch budget.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Video stream open budget.
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    /// Cooldown applied after `max_retries` consecutive failures.
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.retry_cooldown_secs)
    }

    /// Eviction threshold for the staleness sweep.
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    /// Stats cache freshness window.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_port: 8750,
            scan_range: ScanRange::default(),
            device_scheme: DeviceScheme::Https,
            device_port: None,
            scan_interval_secs: 10,
            scan_concurrency: 32,
            fetch_timeout_secs: 5,
            stream_timeout_secs: 10,
            max_retries: 3,
            retry_cooldown_secs: 300,
            staleness_threshold_secs: 300,
            cache_ttl_secs: 5,
        }
    }
}
