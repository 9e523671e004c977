//! Shared mock transports for service tests.
//!
//! These implement the transport traits over scripted in-memory responses
//! with atomic call counters, so timing- and policy-sensitive tests never
//! touch the network.

use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::owl::client::{TelemetryError, TelemetryResult, VideoUpstream};
use crate::owl::traits::{OwlTelemetry, OwlVideo};
use crate::owl::types::{DeviceAddress, StatsPayload};

/// Builds a stats payload with the fields tests care about.
pub(crate) fn payload(cpu_temp: f64, cpu_percent: f64, detecting: bool) -> StatsPayload {
    StatsPayload {
        cpu_temp,
        cpu_percent,
        detecting,
        error: None,
        owl_id: None,
    }
}

/// Same as [`payload`] with a self-reported device id.
pub(crate) fn payload_with_id(cpu_temp: f64, owl_id: &str) -> StatsPayload {
    StatsPayload {
        owl_id: Some(owl_id.to_string()),
        ..payload(cpu_temp, 0.0, false)
    }
}

/// Telemetry transport answering from a scripted address map.
///
/// Addresses without a scripted payload fail with a network-style error.
pub(crate) struct MockTelemetry {
    responses: Mutex<HashMap<Ipv4Addr, StatsPayload>>,
    fetches: AtomicUsize,
}

impl MockTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        })
    }

    /// Scripts a successful response for an address.
    pub fn respond(&self, ip: Ipv4Addr, payload: StatsPayload) {
        self.responses.lock().insert(ip, payload);
    }

    /// Makes an address fail from now on.
    pub fn fail(&self, ip: Ipv4Addr) {
        self.responses.lock().remove(&ip);
    }

    /// Total fetch attempts across all addresses.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OwlTelemetry for MockTelemetry {
    async fn fetch_stats(&self, address: &DeviceAddress) -> TelemetryResult<StatsPayload> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().get(&address.ip) {
            Some(payload) => Ok(payload.clone()),
            None => Err(TelemetryError::Request("scripted: unreachable".into())),
        }
    }
}

/// Video transport emitting a scripted chunk sequence per open.
pub(crate) struct MockVideo {
    connect_ok: bool,
    chunks: Vec<Bytes>,
    interrupt: bool,
    opens: AtomicUsize,
}

impl MockVideo {
    /// Upstream that delivers `chunks` and then ends cleanly.
    pub fn streaming(chunks: Vec<&'static [u8]>) -> Arc<Self> {
        Arc::new(Self {
            connect_ok: true,
            chunks: chunks.into_iter().map(Bytes::from_static).collect(),
            interrupt: false,
            opens: AtomicUsize::new(0),
        })
    }

    /// Upstream that delivers `chunks` and then errors mid-transfer.
    pub fn interrupted(chunks: Vec<&'static [u8]>) -> Arc<Self> {
        Arc::new(Self {
            connect_ok: true,
            chunks: chunks.into_iter().map(Bytes::from_static).collect(),
            interrupt: true,
            opens: AtomicUsize::new(0),
        })
    }

    /// Upstream whose connection fails before any bytes.
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            connect_ok: false,
            chunks: Vec::new(),
            interrupt: false,
            opens: AtomicUsize::new(0),
        })
    }

    /// Total open attempts.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OwlVideo for MockVideo {
    async fn open_video(&self, _address: &DeviceAddress) -> TelemetryResult<VideoUpstream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.connect_ok {
            return Err(TelemetryError::Request("scripted: connection refused".into()));
        }

        let mut items: Vec<Result<Bytes, io::Error>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if self.interrupt {
            items.push(Err(io::Error::other("scripted: connection reset")));
        }

        Ok(VideoUpstream {
            content_type: "multipart/x-mixed-replace; boundary=frame".to_string(),
            chunks: Box::pin(futures::stream::iter(items)),
        })
    }
}
