//! HTTP transport for OWL devices.
//!
//! [`HttpOwlClient`] implements the [`OwlTelemetry`] and [`OwlVideo`] traits
//! over reqwest. The OWL fleet serves self-signed certificates, so the
//! underlying clients are built with invalid-cert acceptance; every request
//! carries HTTP Basic Auth and a bounded timeout.

use std::io;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::header;
use reqwest::Client;
use thiserror::Error;

use crate::owl::traits::{OwlTelemetry, OwlVideo};
use crate::owl::types::{DeviceAddress, StatsPayload};
use crate::secrets::Credentials;

/// Content type served when the upstream response omits one.
///
/// OWL firmware always sends `multipart/x-mixed-replace` for the video feed;
/// this is the passthrough fallback for devices that drop the header.
const DEFAULT_VIDEO_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Errors from a single device transport operation.
///
/// `Request` covers network failures (timeout, refused, DNS, TLS); `Status`
/// and `Payload` cover protocol failures. All three get identical retry
/// treatment from the scheduler and are never fatal.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Request never produced a response (timeout, refused, DNS, TLS).
    #[error("request failed: {0}")]
    Request(String),

    /// Device answered with a non-success status code.
    #[error("device returned status {0}")]
    Status(u16),

    /// Response body did not match the stats contract.
    #[error("malformed stats payload: {0}")]
    Payload(String),
}

/// Result alias for device transport operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Boxed chunk stream re-emitted by the proxy.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// An open upstream video connection.
///
/// Dropping this releases the underlying connection.
pub struct VideoUpstream {
    /// Upstream `Content-Type`, preserved for passthrough.
    pub content_type: String,
    /// Lazy byte-chunk sequence, finite while connected.
    pub chunks: ChunkStream,
}

/// Concrete reqwest-backed implementation of the device transport traits.
pub struct HttpOwlClient {
    /// Client for telemetry fetches; carries a whole-request timeout.
    stats_client: Client,
    /// Client for video streams; connect timeout only, the body is unbounded.
    video_client: Client,
    /// Budget for connection + response headers when opening a stream.
    stream_timeout: Duration,
    credentials: Credentials,
}

impl std::fmt::Debug for HttpOwlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOwlClient")
            .field("stream_timeout", &self.stream_timeout)
            .field("username", &self.credentials.username)
            .finish()
    }
}

impl HttpOwlClient {
    /// Creates a new client for the device fleet.
    ///
    /// # Arguments
    /// * `credentials` - Basic Auth credentials shared by the fleet
    /// * `fetch_timeout` - whole-request budget for telemetry fetches
    /// * `stream_timeout` - connect/header budget for video opens
    ///
    /// # Errors
    ///
    /// Returns an error if either underlying client fails to build.
    pub fn new(
        credentials: Credentials,
        fetch_timeout: Duration,
        stream_timeout: Duration,
    ) -> Result<Self, String> {
        let stats_client = Client::builder()
            .timeout(fetch_timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| format!("failed to build stats client: {}", e))?;

        // No whole-request timeout here: a healthy live feed never ends.
        let video_client = Client::builder()
            .connect_timeout(stream_timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| format!("failed to build video client: {}", e))?;

        Ok(Self {
            stats_client,
            video_client,
            stream_timeout,
            credentials,
        })
    }
}

#[async_trait]
impl OwlTelemetry for HttpOwlClient {
    async fn fetch_stats(&self, address: &DeviceAddress) -> TelemetryResult<StatsPayload> {
        let response = self
            .stats_client
            .get(address.stats_url())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| TelemetryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }

        response
            .json::<StatsPayload>()
            .await
            .map_err(|e| TelemetryError::Payload(e.to_string()))
    }
}

#[async_trait]
impl OwlVideo for HttpOwlClient {
    async fn open_video(&self, address: &DeviceAddress) -> TelemetryResult<VideoUpstream> {
        // The timeout covers connection + response headers; the body stream
        // itself is unbounded.
        let send = self
            .video_client
            .get(address.video_url())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send();

        let response = tokio::time::timeout(self.stream_timeout, send)
            .await
            .map_err(|_| TelemetryError::Request("video open timed out".to_string()))?
            .map_err(|e| TelemetryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_VIDEO_CONTENT_TYPE)
            .to_string();

        let chunks: ChunkStream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(io::Error::other))
            .boxed();

        Ok(VideoUpstream {
            content_type,
            chunks,
        })
    }
}
