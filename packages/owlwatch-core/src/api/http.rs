//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::error::{OwlError, OwlResult};
use crate::owl::types::DeviceId;

/// Standard API success response with JSON data.
fn api_success<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(data))
}

/// Simple success response with `{ "success": true }`.
fn api_ok() -> impl IntoResponse {
    api_success(json!({ "success": true }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/owls", get(list_owls))
        .route("/api/owls/{id}", get(get_owl))
        .route("/api/owls/{id}/stats", get(get_owl_stats))
        .route("/api/discovery/start", post(start_discovery))
        .route("/api/discovery/stop", post(stop_discovery))
        .route("/stream/{id}/live", get(stream_video))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe: "Is the process running?"
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "devices": state.registry.len(),
        "scanning": state.scheduler.is_running(),
    }))
}

/// Ordered snapshot of every known device.
async fn list_owls(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "owls": state.registry.get_all() }))
}

/// One device record, or a 404 JSON error for unknown ids.
async fn get_owl(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> OwlResult<impl IntoResponse> {
    let device_id = DeviceId::from(id);
    let record = state
        .registry
        .get(&device_id)
        .ok_or_else(|| OwlError::DeviceNotFound(device_id.to_string()))?;
    Ok(api_success(record))
}

/// Telemetry for one device, served through the stats cache.
///
/// Stale-but-cached data is preferred over hard failure: the report may
/// carry `status = error` with the last known values.
async fn get_owl_stats(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> OwlResult<impl IntoResponse> {
    let device_id = DeviceId::from(id);
    let record = state
        .registry
        .get(&device_id)
        .ok_or_else(|| OwlError::DeviceNotFound(device_id.to_string()))?;

    let report = state.stats_cache.get_or_fetch(&record.address).await;
    Ok(api_success(report))
}

/// Starts the discovery loop. Idempotent.
async fn start_discovery(State(state): State<AppState>) -> impl IntoResponse {
    let started = state.scheduler.start();
    api_success(json!({ "success": true, "started": started }))
}

/// Stops the discovery loop and waits for it to exit. Idempotent.
async fn stop_discovery(State(state): State<AppState>) -> impl IntoResponse {
    state.scheduler.stop().await;
    api_ok()
}

/// Proxies the device's live video feed to this caller session.
async fn stream_video(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> OwlResult<Response> {
    let device_id = DeviceId::from(id);
    let proxied = state.stream_proxy.open_stream(&device_id).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, proxied.content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(proxied.chunks))
        .map_err(|e| OwlError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owl::test_support::{MockTelemetry, MockVideo};
    use crate::owl::traits::{OwlTelemetry, OwlVideo};
    use crate::services::{
        DeviceRegistry, DiscoveryScheduler, RetryPolicy, SchedulerConfig, StatsCache, StreamProxy,
    };
    use crate::state::{Config, ScanRange};
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use parking_lot::RwLock;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// API state over mock transports - handler tests never touch the network.
    fn test_state() -> AppState {
        let telemetry = MockTelemetry::new() as Arc<dyn OwlTelemetry>;
        let video = MockVideo::streaming(vec![b"frame"]) as Arc<dyn OwlVideo>;

        let registry = Arc::new(DeviceRegistry::new(RetryPolicy {
            max_retries: 3,
            cooldown: Duration::from_secs(300),
        }));
        let stats_cache = Arc::new(StatsCache::new(
            Arc::clone(&telemetry),
            Duration::from_secs(5),
        ));
        let scheduler = Arc::new(DiscoveryScheduler::new(
            telemetry,
            Arc::clone(&registry),
            Arc::clone(&stats_cache),
            SchedulerConfig {
                range: ScanRange::new("192.0.2", 10, 10).unwrap(),
                scheme: crate::owl::types::DeviceScheme::Https,
                port: None,
                interval: Duration::from_secs(10),
                concurrency: 4,
                staleness_threshold: Duration::from_secs(300),
                max_retries: 3,
            },
            CancellationToken::new(),
        ));
        let stream_proxy = Arc::new(StreamProxy::new(video, Arc::clone(&registry)));

        AppState {
            registry,
            stats_cache,
            scheduler,
            stream_proxy,
            config: Arc::new(RwLock::new(Config::default())),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_device_count_and_scan_state() {
        let response = health_check(State(test_state())).await.into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["devices"], 0);
        assert_eq!(body["scanning"], false);
    }

    #[tokio::test]
    async fn list_owls_starts_empty() {
        let response = list_owls(State(test_state())).await.into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["owls"], json!([]));
    }

    #[tokio::test]
    async fn unknown_device_returns_404_json_error() {
        let err = match get_owl(Path("nope".to_string()), State(test_state())).await {
            Ok(_) => panic!("expected an error for an unknown id"),
            Err(err) => err,
        };

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "device_not_found");
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn unknown_stream_returns_404_before_any_network_call() {
        let result = stream_video(Path("nope".to_string()), State(test_state())).await;
        assert!(matches!(result, Err(OwlError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn discovery_lifecycle_handlers_are_idempotent() {
        let state = test_state();

        let first = start_discovery(State(state.clone())).await.into_response();
        assert_eq!(body_json(first).await["started"], true);

        let second = start_discovery(State(state.clone())).await.into_response();
        assert_eq!(body_json(second).await["started"], false);

        let stop = stop_discovery(State(state.clone())).await.into_response();
        assert_eq!(stop.status(), StatusCode::OK);
        assert!(!state.scheduler.is_running());
    }
}
