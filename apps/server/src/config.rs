//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use owlwatch_core::{Config, Credentials, DeviceScheme, ScanRange};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to.
    /// Override: `OWLWATCH_BIND_PORT`
    pub bind_port: u16,

    /// Dotted /24 prefix of the subnet to scan for OWL devices.
    /// Override: `OWLWATCH_SUBNET`
    pub subnet: String,

    /// First host suffix probed each scan pass (inclusive).
    pub first_host: u8,

    /// Last host suffix probed each scan pass (inclusive).
    pub last_host: u8,

    /// Scheme for device endpoints; the OWL fleet serves self-signed HTTPS.
    pub device_scheme: DeviceScheme,

    /// Explicit device port; omit to use the scheme default.
    pub device_port: Option<u16>,

    /// Interval in seconds between scan passes.
    /// Override: `OWLWATCH_SCAN_INTERVAL`
    pub scan_interval_secs: u64,

    /// Maximum in-flight telemetry fetches per scan pass.
    pub scan_concurrency: usize,

    /// Per-request budget for a telemetry fetch (seconds).
    pub fetch_timeout_secs: u64,

    /// Connect/header budget for opening a video stream (seconds).
    pub stream_timeout_secs: u64,

    /// Consecutive failures before an address enters cooldown.
    pub max_retries: u32,

    /// How long a cooled-down address is skipped before retrying (seconds).
    pub retry_cooldown_secs: u64,

    /// Age since last successful contact after which a device is evicted (seconds).
    pub staleness_threshold_secs: u64,

    /// How long cached telemetry is served without a fresh fetch (seconds).
    pub cache_ttl_secs: u64,

    /// Device Basic Auth credentials.
    /// When omitted, `OWLWATCH_USERNAME` / `OWLWATCH_PASSWORD` are used.
    pub credentials: Option<Credentials>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = Config::default();
        Self {
            bind_port: core.bind_port,
            subnet: core.scan_range.subnet,
            first_host: core.scan_range.first_host,
            last_host: core.scan_range.last_host,
            device_scheme: core.device_scheme,
            device_port: core.device_port,
            scan_interval_secs: core.scan_interval_secs,
            scan_concurrency: core.scan_concurrency,
            fetch_timeout_secs: core.fetch_timeout_secs,
            stream_timeout_secs: core.stream_timeout_secs,
            max_retries: core.max_retries,
            retry_cooldown_secs: core.retry_cooldown_secs,
            staleness_threshold_secs: core.staleness_threshold_secs,
            cache_ttl_secs: core.cache_ttl_secs,
            credentials: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("OWLWATCH_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("OWLWATCH_SUBNET") {
            if !val.is_empty() {
                self.subnet = val;
            }
        }

        if let Ok(val) = std::env::var("OWLWATCH_SCAN_INTERVAL") {
            if let Ok(interval) = val.parse() {
                self.scan_interval_secs = interval;
            }
        }

        // Note: OWLWATCH_USERNAME / OWLWATCH_PASSWORD are handled by the
        // EnvCredentialProvider in main.rs when no credentials are configured.
    }

    /// Converts to owlwatch-core's Config type.
    pub fn to_core_config(&self) -> Config {
        Config {
            bind_port: self.bind_port,
            scan_range: ScanRange {
                subnet: self.subnet.clone(),
                first_host: self.first_host,
                last_host: self.last_host,
            },
            device_scheme: self.device_scheme,
            device_port: self.device_port,
            scan_interval_secs: self.scan_interval_secs,
            scan_concurrency: self.scan_concurrency,
            fetch_timeout_secs: self.fetch_timeout_secs,
            stream_timeout_secs: self.stream_timeout_secs,
            max_retries: self.max_retries,
            retry_cooldown_secs: self.retry_cooldown_secs,
            staleness_threshold_secs: self.staleness_threshold_secs,
            cache_ttl_secs: self.cache_ttl_secs,
        }
    }
}
