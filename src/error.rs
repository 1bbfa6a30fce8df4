//! Error taxonomy for backend calls and lookups.

use axum::http::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single outbound attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, reset, or the host could not be resolved.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The attempt exceeded the backend's timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a 5xx status.
    #[error("upstream responded with status {status}")]
    ServerError { status: u16, body: String },

    /// Anything else (malformed response, body decode failure).
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Connection-class errors, timeouts and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Timeout(_) | TransportError::ServerError { .. }
        )
    }
}

/// Result of a breaker-guarded operation.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected without invoking the operation.
    #[error("circuit breaker is open for {name}")]
    Open { name: String, retry_after: Duration },

    /// The operation ran and failed; this is its original error.
    #[error(transparent)]
    Inner(E),
}

/// Availability of a storage tier at the time of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierStatus {
    Connected,
    Disconnected,
}

impl TierStatus {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            TierStatus::Connected
        } else {
            TierStatus::Disconnected
        }
    }
}

impl std::fmt::Display for TierStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierStatus::Connected => write!(f, "connected"),
            TierStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Errors surfaced by the gateway core to its callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend's breaker rejected the call; do not retry immediately.
    #[error("circuit breaker is open for {backend}; service temporarily unavailable")]
    CircuitOpen { backend: String, retry_after: Duration },

    /// Every attempt failed with a retryable transport error.
    #[error("{backend} failed after {attempts} attempt(s): {source}")]
    RetryableTransport {
        backend: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The backend rejected the request (4xx) or it failed without a retryable cause.
    #[error("{backend} rejected the request with status {status}")]
    FatalRequest {
        backend: String,
        status: u16,
        body: String,
    },

    /// No storage tier could answer the lookup.
    #[error("no storage tier available (cache: {cache}, durable: {durable})")]
    BackendUnavailable { cache: TierStatus, durable: TierStatus },

    #[error("backend {0} is not configured")]
    UnknownBackend(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// HTTP status used when this error reaches an inbound client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::CircuitOpen { .. }
            | GatewayError::RetryableTransport { .. }
            | GatewayError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::FatalRequest { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::UnknownBackend(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::CircuitOpen { .. } => "SERVICE_UNAVAILABLE",
            GatewayError::RetryableTransport { .. } => "SERVICE_OFFLINE",
            GatewayError::FatalRequest { .. } => "UPSTREAM_REJECTED",
            GatewayError::BackendUnavailable { .. } => "SHORT_URL_UNAVAILABLE",
            GatewayError::UnknownBackend(_) => "UNKNOWN_SERVICE",
            GatewayError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
