//! Short-TTL memoization of per-device telemetry.
//!
//! Cache-aside over the telemetry transport: fresh entries are served
//! without a network call, stale or missing entries trigger a fetch, and a
//! failed fetch falls back to the stale entry annotated with the failure.
//! Entries are superseded in place, never evicted.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::owl::traits::OwlTelemetry;
use crate::owl::types::{DeviceAddress, StatsReport, Telemetry};

/// One cached telemetry payload.
#[derive(Debug, Clone)]
struct CachedStats {
    captured_at: Instant,
    stats: Telemetry,
}

/// TTL cache of last-known-good telemetry per address.
///
/// Concurrent query paths may race to refresh the same address; last writer
/// wins, and staleness stays bounded by the TTL regardless.
pub struct StatsCache {
    transport: Arc<dyn OwlTelemetry>,
    entries: DashMap<Ipv4Addr, CachedStats>,
    ttl: Duration,
}

impl std::fmt::Debug for StatsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsCache")
            .field("entries", &self.entries)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl StatsCache {
    /// Creates an empty cache over the given transport.
    pub fn new(transport: Arc<dyn OwlTelemetry>, ttl: Duration) -> Self {
        Self {
            transport,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns telemetry for an address, fetching only when the cache is
    /// stale or empty.
    ///
    /// Fallback order on fetch failure: stale entry annotated with the
    /// failure reason, then a zero-value error report. Never returns a hard
    /// failure - the caller always gets something renderable.
    pub async fn get_or_fetch(&self, address: &DeviceAddress) -> StatsReport {
        if let Some(stats) = self.fresh_entry(address) {
            return StatsReport::connected(stats);
        }

        match self.transport.fetch_stats(address).await {
            Ok(payload) => {
                let stats = Telemetry::from(&payload);
                self.store(address, stats.clone());
                StatsReport::connected(stats)
            }
            Err(err) => {
                log::warn!("[Stats] Fetch from {} failed: {}", address, err);
                let stale = self
                    .entries
                    .get(&address.ip)
                    .map(|entry| entry.stats.clone())
                    .unwrap_or_default();
                StatsReport::unreachable(stale, err.to_string())
            }
        }
    }

    /// Stores a successful fetch result, superseding any previous entry.
    ///
    /// Also called by the discovery scheduler so scan-pass probes keep the
    /// cache warm for query paths.
    pub fn store(&self, address: &DeviceAddress, stats: Telemetry) {
        self.entries.insert(
            address.ip,
            CachedStats {
                captured_at: Instant::now(),
                stats,
            },
        );
    }

    /// Returns the cached telemetry if it is younger than the TTL.
    fn fresh_entry(&self, address: &DeviceAddress) -> Option<Telemetry> {
        self.entries.get(&address.ip).and_then(|entry| {
            (entry.captured_at.elapsed() < self.ttl).then(|| entry.stats.clone())
        })
    }
}
