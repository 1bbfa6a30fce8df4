//! Response envelope and error mapping.
//!
//! Every JSON body the gateway produces itself has the shape
//! `{status, message, data, errors}`. Upstream bodies on a forwarded 4xx are
//! passed through untouched when they are JSON.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::GatewayError;

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub message: String,
    pub data: Option<Value>,
    pub errors: Option<Vec<Value>>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>, errors: Vec<Value>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            data: None,
            errors: Some(errors),
        }
    }

    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            GatewayError::FatalRequest { body, .. } => {
                if let Ok(upstream) = serde_json::from_str::<Value>(body) {
                    return (status, Json(upstream)).into_response();
                }
                ApiResponse::error(
                    "The upstream service rejected the request.",
                    vec![json!({ "code": self.code(), "message": self.to_string() })],
                )
                .with_status(status)
            }
            GatewayError::CircuitOpen { retry_after, .. } => {
                let mut response = ApiResponse::error(
                    "Service temporarily unavailable. Please try again later.",
                    vec![json!({ "code": self.code(), "message": self.to_string() })],
                )
                .with_status(status);
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            GatewayError::RetryableTransport { .. } => ApiResponse::error(
                "Service temporarily unavailable. Please try again later.",
                vec![json!({
                    "code": self.code(),
                    "message": "The required service is currently offline or unreachable.",
                })],
            )
            .with_status(status),
            GatewayError::BackendUnavailable { cache, durable } => ApiResponse::error(
                "Short URL lookup is temporarily unavailable.",
                vec![json!({
                    "code": self.code(),
                    "message": self.to_string(),
                    "details": { "cache_status": cache, "durable_status": durable },
                })],
            )
            .with_status(status),
            GatewayError::UnknownBackend(_) | GatewayError::InvalidRequest(_) => {
                ApiResponse::error(
                    self.to_string(),
                    vec![json!({ "code": self.code(), "message": self.to_string() })],
                )
                .with_status(status)
            }
        }
    }
}
