//! Background subnet scanning loop.
//!
//! The scheduler repeats a scan pass at a fixed interval: enumerate the
//! configured address range, probe each eligible address with a bounded
//! worker pool, apply results to the registry, then sweep stale records.
//! Start/stop are idempotent and cancellation is responsive - the inter-pass
//! sleep is interruptible and no new fetch starts once a stop is observed.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::owl::traits::OwlTelemetry;
use crate::owl::types::{DeviceAddress, DeviceId, DeviceScheme, StatsPayload, Telemetry};
use crate::state::{Config, ScanRange};

use super::registry::DeviceRegistry;
use super::stats_cache::StatsCache;

/// Scan-loop tunables, copied out of [`Config`] at bootstrap.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Address range enumerated each pass.
    pub range: ScanRange,
    /// Scheme for device endpoints.
    pub scheme: DeviceScheme,
    /// Explicit device port, if any.
    pub port: Option<u16>,
    /// Pause between scan passes.
    pub interval: Duration,
    /// Maximum in-flight fetches per pass.
    pub concurrency: usize,
    /// Eviction threshold for the post-pass sweep.
    pub staleness_threshold: Duration,
    /// Failure count at which an address enters cooldown (for logging).
    pub max_retries: u32,
}

impl SchedulerConfig {
    /// Extracts the scan tunables from the engine configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            range: config.scan_range.clone(),
            scheme: config.device_scheme,
            port: config.device_port,
            interval: config.scan_interval(),
            concurrency: config.scan_concurrency,
            staleness_threshold: config.staleness_threshold(),
            max_retries: config.max_retries,
        }
    }
}

/// A live scan loop: its cancellation token and join handle.
struct RunHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Periodic, cancellable discovery loop over the configured subnet.
///
/// The scheduler is the registry's only writer; per-address failures are
/// contained and recorded, never aborting a pass or the loop.
pub struct DiscoveryScheduler {
    transport: Arc<dyn OwlTelemetry>,
    registry: Arc<DeviceRegistry>,
    cache: Arc<StatsCache>,
    config: SchedulerConfig,
    /// Parent token: cancelling it (app shutdown) stops the loop too.
    shutdown: CancellationToken,
    run: Mutex<Option<RunHandle>>,
}

impl std::fmt::Debug for DiscoveryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryScheduler")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DiscoveryScheduler {
    /// Creates a stopped scheduler.
    pub fn new(
        transport: Arc<dyn OwlTelemetry>,
        registry: Arc<DeviceRegistry>,
        cache: Arc<StatsCache>,
        config: SchedulerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            registry,
            cache,
            config,
            shutdown,
            run: Mutex::new(None),
        }
    }

    /// Starts the scan loop.
    ///
    /// Returns `true` if a new loop was started, `false` if one was already
    /// running (starting twice never duplicates the loop).
    pub fn start(self: &Arc<Self>) -> bool {
        let mut run = self.run.lock();
        if let Some(handle) = run.as_ref() {
            if !handle.join.is_finished() {
                log::debug!("[Discovery] Start ignored: scan loop already running");
                return false;
            }
        }

        let token = self.shutdown.child_token();
        let scheduler = Arc::clone(self);
        let loop_token = token.clone();
        let join = tokio::spawn(async move {
            scheduler.run_loop(loop_token).await;
        });

        *run = Some(RunHandle { token, join });
        log::info!(
            "[Discovery] Scanning {}.{}-{} every {}s",
            self.config.range.subnet,
            self.config.range.first_host,
            self.config.range.last_host,
            self.config.interval.as_secs()
        );
        true
    }

    /// Stops the scan loop and waits for it to exit.
    ///
    /// Bounded by at most one in-flight fetch timeout: no new fetch starts
    /// after the cancellation is observed, but in-flight results still
    /// apply. Stopping a stopped scheduler is a no-op.
    pub async fn stop(&self) {
        let handle = self.run.lock().take();
        let Some(handle) = handle else {
            log::debug!("[Discovery] Stop ignored: scan loop not running");
            return;
        };

        handle.token.cancel();
        if let Err(err) = handle.join.await {
            log::warn!("[Discovery] Scan loop task failed: {}", err);
        }
        log::info!("[Discovery] Scan loop stopped");
    }

    /// Whether a scan loop is currently running.
    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.join.is_finished())
    }

    async fn run_loop(&self, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                break;
            }
            self.scan_pass(&token).await;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// One full enumeration of the address range, then the staleness sweep.
    ///
    /// The sweep runs strictly after every fetch of the pass has completed,
    /// so an in-flight success is never evicted by the same pass. A pass
    /// aborted by cancellation skips the sweep entirely.
    async fn scan_pass(&self, token: &CancellationToken) {
        let addresses = self
            .config
            .range
            .addresses(self.config.scheme, self.config.port);

        futures::stream::iter(addresses)
            .for_each_concurrent(self.config.concurrency, |address| {
                let token = token.clone();
                async move {
                    if token.is_cancelled() {
                        return;
                    }
                    self.probe(address).await;
                }
            })
            .await;

        if token.is_cancelled() {
            return;
        }
        self.registry.sweep_stale(self.config.staleness_threshold);
    }

    /// Probes one address and applies the result to registry and cache.
    async fn probe(&self, address: DeviceAddress) {
        if !self.registry.should_attempt(&address) {
            return;
        }

        match self.transport.fetch_stats(&address).await {
            Ok(payload) => {
                let device_id = derive_device_id(&payload, &address);
                let telemetry = Telemetry::from(&payload);
                self.cache.store(&address, telemetry.clone());
                self.registry.upsert(device_id, address, telemetry);
                self.registry.clear_failure(&address);
            }
            Err(err) => {
                self.registry.mark_disconnected(&address);
                let failures = self.registry.record_failure(&address);
                // Log only the transitions, not every repeated failure - a
                // mostly-empty subnet fails hundreds of probes per pass.
                if failures == 1 {
                    log::debug!("[Discovery] {} unreachable: {}", address, err);
                } else if failures == self.config.max_retries {
                    log::warn!(
                        "[Discovery] {} failed {} times, entering cooldown",
                        address,
                        failures
                    );
                }
            }
        }
    }
}

/// Derives the stable device id for a successful probe.
///
/// The self-reported `owl_id` wins when present and non-empty; otherwise
/// the id falls back to the address's host suffix.
pub fn derive_device_id(payload: &StatsPayload, address: &DeviceAddress) -> DeviceId {
    match payload.owl_id.as_deref() {
        Some(id) if !id.is_empty() => DeviceId::from(id),
        _ => DeviceId::from_suffix(address.host_suffix()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owl::test_support::{payload, payload_with_id, MockTelemetry};
    use crate::owl::types::DeviceStatus;
    use crate::services::registry::RetryPolicy;

    fn addr(suffix: u8) -> DeviceAddress {
        DeviceAddress::new(
            DeviceScheme::Https,
            format!("192.0.2.{}", suffix).parse().unwrap(),
            None,
        )
    }

    fn scheduler_over(
        transport: Arc<MockTelemetry>,
        first_host: u8,
        last_host: u8,
    ) -> Arc<DiscoveryScheduler> {
        let registry = Arc::new(DeviceRegistry::new(RetryPolicy {
            max_retries: 3,
            cooldown: Duration::from_secs(300),
        }));
        let cache = Arc::new(StatsCache::new(
            Arc::clone(&transport) as Arc<dyn OwlTelemetry>,
            Duration::from_secs(5),
        ));
        let config = SchedulerConfig {
            range: ScanRange::new("192.0.2", first_host, last_host).unwrap(),
            scheme: DeviceScheme::Https,
            port: None,
            interval: Duration::from_secs(10),
            concurrency: 8,
            staleness_threshold: Duration::from_secs(300),
            max_retries: 3,
        };
        Arc::new(DiscoveryScheduler::new(
            transport,
            registry,
            cache,
            config,
            CancellationToken::new(),
        ))
    }

    #[test]
    fn device_id_prefers_self_reported_owl_id() {
        let id = derive_device_id(&payload_with_id(45.0, "barn-cam"), &addr(37));
        assert_eq!(id.as_str(), "barn-cam");
    }

    #[test]
    fn device_id_falls_back_to_host_suffix() {
        let id = derive_device_id(&payload(45.0, 12.0, true), &addr(37));
        assert_eq!(id.as_str(), "owl-37");

        // An empty self-reported id does not count.
        let empty_id = payload_with_id(45.0, "");
        assert_eq!(derive_device_id(&empty_id, &addr(37)).as_str(), "owl-37");
    }

    #[tokio::test]
    async fn scan_pass_registers_a_responding_device() {
        let transport = MockTelemetry::new();
        transport.respond(addr(10).ip, payload(45.0, 12.0, true));
        let scheduler = scheduler_over(Arc::clone(&transport), 10, 12);

        scheduler.scan_pass(&CancellationToken::new()).await;

        let record = scheduler.registry.get(&"owl-10".into()).unwrap();
        assert_eq!(record.status, DeviceStatus::Connected);
        assert_eq!(record.telemetry.cpu_temperature, 45.0);
        assert!(record.telemetry.detecting);

        // The failing neighbours were attempted but not registered.
        assert_eq!(transport.fetch_count(), 3);
        assert_eq!(scheduler.registry.len(), 1);
    }

    #[tokio::test]
    async fn scan_pass_keeps_the_stats_cache_warm() {
        let transport = MockTelemetry::new();
        transport.respond(addr(10).ip, payload(45.0, 12.0, true));
        let scheduler = scheduler_over(Arc::clone(&transport), 10, 10);

        scheduler.scan_pass(&CancellationToken::new()).await;
        let fetches_after_pass = transport.fetch_count();

        let report = scheduler.cache.get_or_fetch(&addr(10)).await;
        assert_eq!(transport.fetch_count(), fetches_after_pass);
        assert_eq!(report.cpu_temperature, 45.0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_address_is_skipped_after_max_retries_until_cooldown() {
        let transport = MockTelemetry::new();
        let scheduler = scheduler_over(Arc::clone(&transport), 10, 10);
        let token = CancellationToken::new();

        for _ in 0..3 {
            scheduler.scan_pass(&token).await;
        }
        assert_eq!(transport.fetch_count(), 3);

        // Fourth pass: the address is in cooldown, no network call.
        scheduler.scan_pass(&token).await;
        assert_eq!(transport.fetch_count(), 3);

        // Cooldown elapsed: eligible again.
        tokio::time::advance(Duration::from_secs(301)).await;
        scheduler.scan_pass(&token).await;
        assert_eq!(transport.fetch_count(), 4);
    }

    #[tokio::test]
    async fn known_device_that_stops_responding_shows_disconnected_until_swept() {
        let transport = MockTelemetry::new();
        transport.respond(addr(10).ip, payload(45.0, 12.0, true));
        let scheduler = scheduler_over(Arc::clone(&transport), 10, 10);
        let token = CancellationToken::new();

        scheduler.scan_pass(&token).await;
        transport.fail(addr(10).ip);
        scheduler.scan_pass(&token).await;

        // Still listed (not yet stale) but no longer connected.
        let record = scheduler.registry.get(&"owl-10".into()).unwrap();
        assert_eq!(record.status, DeviceStatus::Disconnected);
        assert_eq!(record.telemetry.cpu_temperature, 45.0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_is_swept_after_the_staleness_threshold() {
        let transport = MockTelemetry::new();
        transport.respond(addr(10).ip, payload(45.0, 12.0, true));
        let scheduler = scheduler_over(Arc::clone(&transport), 10, 10);
        let token = CancellationToken::new();

        scheduler.scan_pass(&token).await;
        assert!(scheduler.registry.get(&"owl-10".into()).is_some());

        transport.fail(addr(10).ip);
        tokio::time::advance(Duration::from_secs(301)).await;
        scheduler.scan_pass(&token).await;

        assert!(scheduler.registry.get(&"owl-10".into()).is_none());
    }

    #[tokio::test]
    async fn cancelled_pass_starts_no_fetch_and_skips_the_sweep() {
        let transport = MockTelemetry::new();
        let scheduler = scheduler_over(Arc::clone(&transport), 10, 20);

        // A device that would be stale if the sweep ran with a zero threshold.
        scheduler
            .registry
            .upsert("owl-99".into(), addr(99), Telemetry::default());

        let token = CancellationToken::new();
        token.cancel();
        scheduler.scan_pass(&token).await;

        assert_eq!(transport.fetch_count(), 0);
        assert!(scheduler.registry.get(&"owl-99".into()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_and_stop_is_awaitable() {
        let transport = MockTelemetry::new();
        transport.respond(addr(10).ip, payload(45.0, 12.0, true));
        let scheduler = scheduler_over(Arc::clone(&transport), 10, 10);

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());

        scheduler.stop().await;
        assert!(!scheduler.is_running());

        // Stopping again is a no-op, and a restart spawns a fresh loop.
        scheduler.stop().await;
        assert!(scheduler.start());
        scheduler.stop().await;
    }
}
