//! Authoritative directory of discovered OWL devices.
//!
//! The registry owns two concurrent maps: device records keyed by id, and
//! failure trackers keyed by address. The discovery scheduler is the only
//! writer; query paths read snapshots concurrently. Failure bookkeeping is
//! per *address* rather than per device, since a failing address may never
//! have reported a device id.

use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::owl::types::{DeviceAddress, DeviceId, DeviceRecord, DeviceStatus, Telemetry};

/// Retry/cooldown policy for failing addresses.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failures before an address enters cooldown.
    pub max_retries: u32,
    /// How long a cooled-down address is skipped before becoming eligible.
    pub cooldown: Duration,
}

/// Stored record plus the monotonic timestamp the staleness sweep compares.
#[derive(Debug)]
struct RegistryEntry {
    record: DeviceRecord,
    last_seen: Instant,
}

/// Per-address failure bookkeeping.
#[derive(Debug)]
struct FailureTracker {
    consecutive_failures: u32,
    last_attempt_at: Instant,
}

/// Thread-safe store of device records with colocated failure tracking.
///
/// # Concurrency design
///
/// Both maps use `DashMap` for atomic per-key updates with safe concurrent
/// iteration. The scheduler is the single writer, so snapshot readers never
/// observe a torn record.
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: DashMap<DeviceId, RegistryEntry>,
    failures: DashMap<Ipv4Addr, FailureTracker>,
    policy: RetryPolicy,
}

impl DeviceRegistry {
    /// Creates an empty registry with the given retry policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            devices: DashMap::new(),
            failures: DashMap::new(),
            policy,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Device Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Sets or refreshes a device record after a successful contact.
    ///
    /// Stamps `last_seen` with the current time and marks the record
    /// `connected`. First discovery of an id is logged.
    pub fn upsert(&self, device_id: DeviceId, address: DeviceAddress, telemetry: Telemetry) {
        let record = DeviceRecord {
            device_id: device_id.clone(),
            address,
            status: DeviceStatus::Connected,
            last_seen_ms: now_millis(),
            telemetry,
        };
        let entry = RegistryEntry {
            record,
            last_seen: Instant::now(),
        };

        if self.devices.insert(device_id.clone(), entry).is_none() {
            log::info!("[Registry] Discovered device {} at {}", device_id, address);
        }
    }

    /// Marks any record at the given address as disconnected.
    ///
    /// The record stays listed with its last telemetry until the staleness
    /// sweep evicts it; only the liveness classification changes. A later
    /// successful contact flips it back through [`Self::upsert`].
    pub fn mark_disconnected(&self, address: &DeviceAddress) {
        for mut entry in self.devices.iter_mut() {
            if entry.record.address == *address {
                entry.record.status = DeviceStatus::Disconnected;
            }
        }
    }

    /// Removes every record whose last successful contact is older than
    /// `threshold`, logging each eviction.
    ///
    /// Called once per scan pass, strictly after all per-address updates of
    /// that pass are visible.
    pub fn sweep_stale(&self, threshold: Duration) {
        let now = Instant::now();
        self.devices.retain(|device_id, entry| {
            let age = now.saturating_duration_since(entry.last_seen);
            if age > threshold {
                log::info!(
                    "[Registry] Evicting stale device {} (last seen {}s ago)",
                    device_id,
                    age.as_secs()
                );
                false
            } else {
                true
            }
        });
    }

    /// Snapshot of all records, ordered by device id.
    pub fn get_all(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> = self
            .devices
            .iter()
            .map(|entry| entry.value().record.clone())
            .collect();
        records.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        records
    }

    /// Looks up a single record by id.
    pub fn get(&self, device_id: &DeviceId) -> Option<DeviceRecord> {
        self.devices
            .get(device_id)
            .map(|entry| entry.value().record.clone())
    }

    /// Number of known devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no devices are currently known.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Failure Tracking
    // ─────────────────────────────────────────────────────────────────────────

    /// Records a failed attempt against an address.
    ///
    /// Returns the new consecutive-failure count; the scheduler uses it for
    /// transition-only logging.
    pub fn record_failure(&self, address: &DeviceAddress) -> u32 {
        let mut tracker = self
            .failures
            .entry(address.ip)
            .or_insert_with(|| FailureTracker {
                consecutive_failures: 0,
                last_attempt_at: Instant::now(),
            });
        tracker.consecutive_failures += 1;
        tracker.last_attempt_at = Instant::now();
        tracker.consecutive_failures
    }

    /// Whether an address is eligible for a fetch attempt.
    ///
    /// Addresses under `max_retries` are always eligible. Once the threshold
    /// is reached the address is skipped until the cooldown elapses, at which
    /// point the tracker resets and the address becomes eligible again.
    pub fn should_attempt(&self, address: &DeviceAddress) -> bool {
        let cooled_down = match self.failures.get(&address.ip) {
            None => return true,
            Some(tracker) => {
                if tracker.consecutive_failures < self.policy.max_retries {
                    return true;
                }
                tracker.last_attempt_at.elapsed() > self.policy.cooldown
            }
        };

        if cooled_down {
            // Cooldown expired: reset so the address gets a fresh retry budget.
            self.failures.remove(&address.ip);
        }
        cooled_down
    }

    /// Drops the failure tracker after a successful contact.
    pub fn clear_failure(&self, address: &DeviceAddress) {
        self.failures.remove(&address.ip);
    }

    #[cfg(test)]
    pub(crate) fn failure_count(&self, address: &DeviceAddress) -> u32 {
        self.failures
            .get(&address.ip)
            .map(|t| t.consecutive_failures)
            .unwrap_or(0)
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
