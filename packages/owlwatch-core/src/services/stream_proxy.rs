//! Live video proxying.
//!
//! Each caller session gets its own upstream connection to the device's
//! video endpoint; the upstream body is re-emitted chunk-by-chunk as a lazy
//! stream with no whole-stream buffering. There is no shared multiplexing
//! between sessions in this version, and no automatic reconnect - the
//! dashboard re-requesting is the recovery path.

use std::sync::Arc;

use async_stream::stream;
use futures::stream::StreamExt;
use uuid::Uuid;

use crate::error::{OwlError, OwlResult};
use crate::owl::client::ChunkStream;
use crate::owl::traits::OwlVideo;
use crate::owl::types::DeviceId;

use super::registry::DeviceRegistry;

/// An open proxied video session.
pub struct ProxiedStream {
    /// Per-session id, used for log correlation.
    pub session_id: Uuid,
    /// Upstream `Content-Type`, passed through to the caller.
    pub content_type: String,
    /// Lazy byte-chunk sequence; ends when the upstream closes or errors.
    pub chunks: ChunkStream,
}

/// Opens per-session proxied connections to device video feeds.
pub struct StreamProxy {
    transport: Arc<dyn OwlVideo>,
    registry: Arc<DeviceRegistry>,
}

impl std::fmt::Debug for StreamProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProxy")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl StreamProxy {
    /// Creates a proxy over the given transport and device directory.
    pub fn new(transport: Arc<dyn OwlVideo>, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Opens one upstream connection for a caller session.
    ///
    /// Unknown ids fail with `DeviceNotFound` before any network call. A
    /// connection failure before the first byte surfaces as
    /// `StreamUpstream`; a mid-transfer interruption simply ends the
    /// sequence (logged, not surfaced). Dropping the returned stream
    /// releases the upstream connection.
    pub async fn open_stream(&self, device_id: &DeviceId) -> OwlResult<ProxiedStream> {
        let record = self
            .registry
            .get(device_id)
            .ok_or_else(|| OwlError::DeviceNotFound(device_id.to_string()))?;

        let upstream = self
            .transport
            .open_video(&record.address)
            .await
            .map_err(|err| OwlError::StreamUpstream(err.to_string()))?;

        let session_id = Uuid::new_v4();
        log::info!(
            "[Stream] Session {} opened for {} at {}",
            session_id,
            device_id,
            record.address
        );

        let mut inner = upstream.chunks;
        let chunks: ChunkStream = Box::pin(stream! {
            while let Some(chunk) = inner.next().await {
                match chunk {
                    Ok(bytes) => yield Ok(bytes),
                    Err(err) => {
                        log::warn!("[Stream] Session {} interrupted: {}", session_id, err);
                        break;
                    }
                }
            }
            log::debug!("[Stream] Session {} closed", session_id);
        });

        Ok(ProxiedStream {
            session_id,
            content_type: upstream.content_type,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owl::test_support::MockVideo;
    use crate::owl::types::{DeviceAddress, DeviceScheme, Telemetry};
    use crate::services::registry::RetryPolicy;
    use std::time::Duration;

    fn registry_with_device(id: &str) -> Arc<DeviceRegistry> {
        let registry = Arc::new(DeviceRegistry::new(RetryPolicy {
            max_retries: 3,
            cooldown: Duration::from_secs(300),
        }));
        registry.upsert(
            id.into(),
            DeviceAddress::new(DeviceScheme::Https, "192.0.2.10".parse().unwrap(), None),
            Telemetry::default(),
        );
        registry
    }

    #[tokio::test]
    async fn unknown_device_fails_without_a_network_call() {
        let transport = MockVideo::streaming(vec![b"frame"]);
        let proxy = StreamProxy::new(
            Arc::clone(&transport) as Arc<dyn OwlVideo>,
            registry_with_device("owl-10"),
        );

        let result = proxy.open_stream(&"unknown".into()).await;
        assert!(matches!(result, Err(OwlError::DeviceNotFound(_))));
        assert_eq!(transport.open_count(), 0);
    }

    #[tokio::test]
    async fn chunks_pass_through_in_order() {
        let transport = MockVideo::streaming(vec![b"frame-1", b"frame-2"]);
        let proxy = StreamProxy::new(
            Arc::clone(&transport) as Arc<dyn OwlVideo>,
            registry_with_device("owl-10"),
        );

        let proxied = proxy.open_stream(&"owl-10".into()).await.unwrap();
        assert_eq!(
            proxied.content_type,
            "multipart/x-mixed-replace; boundary=frame"
        );

        let chunks: Vec<_> = proxied
            .chunks
            .map(|chunk| chunk.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(chunks, vec![&b"frame-1"[..], &b"frame-2"[..]]);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn connect_failure_surfaces_as_upstream_error() {
        let transport = MockVideo::refusing();
        let proxy = StreamProxy::new(
            Arc::clone(&transport) as Arc<dyn OwlVideo>,
            registry_with_device("owl-10"),
        );

        let result = proxy.open_stream(&"owl-10".into()).await;
        assert!(matches!(result, Err(OwlError::StreamUpstream(_))));
    }

    #[tokio::test]
    async fn interruption_ends_the_sequence_instead_of_erroring() {
        let transport = MockVideo::interrupted(vec![b"frame-1"]);
        let proxy = StreamProxy::new(
            Arc::clone(&transport) as Arc<dyn OwlVideo>,
            registry_with_device("owl-10"),
        );

        let proxied = proxy.open_stream(&"owl-10".into()).await.unwrap();
        let chunks: Vec<_> = proxied.chunks.collect::<Vec<_>>().await;

        // The delivered chunk arrives, then the stream terminates cleanly.
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().as_ref(), b"frame-1");
    }

    #[tokio::test]
    async fn concurrent_sessions_open_independent_upstreams() {
        let transport = MockVideo::streaming(vec![b"frame"]);
        let proxy = StreamProxy::new(
            Arc::clone(&transport) as Arc<dyn OwlVideo>,
            registry_with_device("owl-10"),
        );

        let a = proxy.open_stream(&"owl-10".into()).await.unwrap();
        let b = proxy.open_stream(&"owl-10".into()).await.unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(transport.open_count(), 2);
    }
}
