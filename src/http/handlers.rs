//! Route handlers.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::GatewayError;
use crate::http::request::request_id;
use crate::http::response::ApiResponse;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::OutboundRequest;
use crate::storage::{ShortUrlRecord, StorageError};

const MAX_EXPIRY_DAYS: u32 = 30;

pub async fn root() -> Json<Value> {
    metrics::record_request("root", 200);
    Json(json!({ "name": "gateway", "status": "online" }))
}

/// Fan-out probe of every registered backend.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let names = state.gateway.health().names();
    let reports = state.gateway.aggregator.check_all(&names).await;
    metrics::record_request("health", 200);
    Json(json!(reports))
}

/// Breaker and health state as currently recorded, without probing.
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    metrics::record_request("status", 200);
    Json(json!({
        "gateway": { "status": "online" },
        "circuit_breakers": state.gateway.registry.breaker_snapshots(),
        "backends": state.gateway.health().snapshot(),
    }))
}

pub async fn redirect(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.gateway.resolver.lookup(&code).await {
        Ok(Some(result)) => {
            let target = result.value.unwrap_or_default();
            tracing::debug!(code = %code, source = ?result.source, "Redirecting");
            metrics::record_request("redirect", 302);
            (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
        }
        Ok(None) => {
            metrics::record_request("redirect", 404);
            let health = state.gateway.resolver.tier_health();
            ApiResponse::error(
                "Short URL not found or has expired.",
                vec![json!({
                    "code": "SHORT_URL_NOT_FOUND",
                    "message": "The requested short URL does not exist or is no longer active.",
                    "details": health,
                })],
            )
            .with_status(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            tracing::warn!(code = %code, error = %e, "Short URL lookup degraded");
            metrics::record_request("redirect", e.status_code().as_u16());
            e.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLink {
    pub long_url: Option<String>,
    pub custom_short: Option<String>,
    pub expires_in_days: Option<u32>,
}

fn field_error(field: &str, message: &str) -> Value {
    json!({ "field": field, "message": message })
}

fn validate_create(request: &CreateLink) -> Vec<Value> {
    let mut errors = Vec::new();

    match request.long_url.as_deref() {
        None | Some("") => errors.push(field_error("long_url", "Long URL is required.")),
        Some(raw) => match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => errors.push(field_error("long_url", "Must be a valid URL.")),
        },
    }

    match request.expires_in_days {
        Some(days) if (1..=MAX_EXPIRY_DAYS).contains(&days) => {}
        _ => errors.push(field_error(
            "expires_in_days",
            "Expiration must be between 1 and 30 days.",
        )),
    }

    if let Some(code) = request.custom_short.as_deref() {
        let valid_chars = code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !(3..=50).contains(&code.len()) || !valid_chars {
            errors.push(field_error(
                "custom_short",
                "Custom short code contains invalid characters or is too long.",
            ));
        }
    }

    errors
}

pub async fn create_link(
    State(state): State<AppState>,
    payload: Result<Json<CreateLink>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            metrics::record_request("create_link", 400);
            return ApiResponse::error(
                "Validation failed.",
                vec![field_error("body", &rejection.body_text())],
            )
            .with_status(StatusCode::BAD_REQUEST);
        }
    };

    let errors = validate_create(&request);
    if !errors.is_empty() {
        metrics::record_request("create_link", 400);
        return ApiResponse::error("Validation failed.", errors).with_status(StatusCode::BAD_REQUEST);
    }

    let writer = &state.gateway.writer;
    let code = match request.custom_short.clone() {
        Some(code) => match writer.is_taken(&code).await {
            Ok(false) => code,
            Ok(true) => return code_taken(&code),
            Err(e) => return create_unavailable(&code, &e),
        },
        None => match writer.allocate_code().await {
            Ok(code) => code,
            Err(e) => return create_unavailable("<generated>", &e),
        },
    };
    let target = request.long_url.clone().unwrap_or_default();
    let days = u64::from(request.expires_in_days.unwrap_or(1));
    let ttl = Duration::from_secs(days * 86_400);

    let record = match ShortUrlRecord::new(&code, &target, ttl) {
        Ok(record) => record,
        Err(e) => {
            metrics::record_request("create_link", 400);
            return ApiResponse::error("Validation failed.", vec![field_error("input", &e.to_string())])
                .with_status(StatusCode::BAD_REQUEST);
        }
    };
    let data = json!({
        "short_code": record.code,
        "long_url": record.target,
        "created_at": record.created_at,
        "expires_at": record.expires_at,
        "visits": record.visit_count,
    });

    match writer.publish(record).await {
        Ok(()) => {
            metrics::record_request("create_link", 201);
            ApiResponse::success("Short URL created successfully.", data).with_status(StatusCode::CREATED)
        }
        Err(StorageError::Conflict(code)) if request.custom_short.is_some() => code_taken(&code),
        Err(e) => create_unavailable(&code, &e),
    }
}

fn code_taken(code: &str) -> Response {
    metrics::record_request("create_link", 409);
    ApiResponse::error(
        "Custom short URL is already taken.",
        vec![field_error(
            "custom_short",
            &format!("The short code '{code}' is already in use."),
        )],
    )
    .with_status(StatusCode::CONFLICT)
}

fn create_unavailable(code: &str, error: &StorageError) -> Response {
    tracing::error!(code = %code, error = %error, "Failed to publish short link");
    metrics::record_request("create_link", 503);
    ApiResponse::error(
        "Service temporarily unavailable.",
        vec![json!({
            "code": "SERVICE_UNAVAILABLE",
            "message": "URL shortening service is temporarily unavailable. Please try again later.",
        })],
    )
    .with_status(StatusCode::SERVICE_UNAVAILABLE)
}

pub async fn delete_link(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.gateway.writer.remove(&code).await {
        Ok(true) => {
            metrics::record_request("delete_link", 200);
            ApiResponse::success("Short URL deleted successfully.", json!({ "short_code": code }))
                .with_status(StatusCode::OK)
        }
        Ok(false) => {
            metrics::record_request("delete_link", 404);
            ApiResponse::error(
                "Short URL not found.",
                vec![json!({ "code": "SHORT_URL_NOT_FOUND", "message": format!("No short URL '{code}'.") })],
            )
            .with_status(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            tracing::error!(code = %code, error = %e, "Failed to delete short link");
            metrics::record_request("delete_link", 503);
            ApiResponse::error(
                "Service temporarily unavailable.",
                vec![json!({ "code": "SERVICE_UNAVAILABLE", "message": e.to_string() })],
            )
            .with_status(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Forward `/api/{service}/{path}` to the named service.
pub async fn forward(
    State(state): State<AppState>,
    Path((service, path)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut upstream_path = format!("/{path}");
    if let Some(query) = uri.query() {
        upstream_path.push('?');
        upstream_path.push_str(query);
    }

    let mut request = OutboundRequest::new(method, upstream_path);
    if !body.is_empty() {
        match serde_json::from_slice::<Value>(&body) {
            Ok(json) => request = request.with_body(json),
            Err(e) => {
                let err = GatewayError::InvalidRequest(format!("request body is not valid JSON: {e}"));
                metrics::record_request("forward", err.status_code().as_u16());
                return err.into_response();
            }
        }
    }
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        request = request.with_authorization(auth);
    }
    if let Some(id) = request_id(&headers) {
        request = request.with_request_id(id);
    }

    match state.gateway.client.call(&service, request).await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            metrics::record_request("forward", status.as_u16());
            let mut response = (status, upstream.body).into_response();
            if let Some(value) = upstream
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
            {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => {
            tracing::warn!(backend = %service, error = %e, "Forwarded call failed");
            metrics::record_request("forward", e.status_code().as_u16());
            e.into_response()
        }
    }
}

pub async fn not_found() -> Response {
    metrics::record_request("not_found", 404);
    ApiResponse::error(
        "Endpoint not found.",
        vec![json!({ "code": "ENDPOINT_NOT_FOUND", "message": "The requested endpoint does not exist." })],
    )
    .with_status(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(url: Option<&str>, code: Option<&str>, days: Option<u32>) -> CreateLink {
        CreateLink {
            long_url: url.map(str::to_string),
            custom_short: code.map(str::to_string),
            expires_in_days: days,
        }
    }

    #[test]
    fn test_create_validation_collects_every_problem() {
        assert!(validate_create(&create(Some("https://example.com"), None, Some(7))).is_empty());
        assert!(validate_create(&create(Some("https://example.com"), Some("my-link_1"), Some(30))).is_empty());

        let errors = validate_create(&create(Some("not a url"), Some("a!"), Some(31)));
        let fields: Vec<_> = errors.iter().map(|e| e["field"].as_str().unwrap()).collect();
        assert_eq!(fields, vec!["long_url", "expires_in_days", "custom_short"]);

        let errors = validate_create(&create(None, None, None));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_rejects_non_http_targets() {
        let errors = validate_create(&create(Some("ftp://example.com/file"), None, Some(1)));
        assert_eq!(errors.len(), 1);
    }
}
