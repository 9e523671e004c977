//! Centralized error types for the Owlwatch core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::owl::client::TelemetryError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for TelemetryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => "device_unreachable",
            Self::Status(_) => "device_error_status",
            Self::Payload(_) => "malformed_stats_payload",
        }
    }
}

/// Application-wide error type for the Owlwatch server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum OwlError {
    /// Requested device ID does not exist in the registry.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Telemetry fetch from a device failed.
    #[error("Telemetry fetch failed: {0}")]
    Telemetry(String),

    /// Upstream video connection failed before any bytes were delivered.
    #[error("Stream upstream failed: {0}")]
    StreamUpstream(String),

    /// Server configuration error (invalid scan range, bad credentials format).
    ///
    /// Fatal at startup only - never produced by a running scan.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OwlError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeviceNotFound(_) => "device_not_found",
            Self::Telemetry(_) => "telemetry_failed",
            Self::StreamUpstream(_) => "stream_upstream_failed",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            Self::StreamUpstream(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type OwlResult<T> = Result<T, OwlError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for OwlError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<TelemetryError> for OwlError {
    fn from(err: TelemetryError) -> Self {
        Self::Telemetry(err.to_string())
    }
}
