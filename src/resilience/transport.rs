//! Outbound request transport.
//!
//! The [`Transport`] trait is the single seam between the retry/breaker
//! logic and the wire. [`HttpTransport`] sends over `reqwest`; tests plug in
//! scripted transports.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::TransportError;

/// A call to a downstream service, relative to its base URL.
#[derive(Debug, Clone, Default)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn with_request_id(mut self, value: impl Into<String>) -> Self {
        self.request_id = Some(value.into());
        self
    }
}

/// A fully read upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl OutboundResponse {
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one attempt. 5xx responses are returned as responses; the
    /// caller decides how to classify them.
    async fn send(
        &self,
        service: &ServiceConfig,
        request: &OutboundRequest,
    ) -> Result<OutboundResponse, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shortlink-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() || error.is_request() || error.is_body() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        service: &ServiceConfig,
        request: &OutboundRequest,
    ) -> Result<OutboundResponse, TransportError> {
        let url = service.endpoint(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(auth) = &request.authorization {
            builder = builder.header(AUTHORIZATION, auth);
        }
        if let Some(id) = &request.request_id {
            builder = builder.header("x-request-id", id);
        }

        tracing::trace!(backend = %service.name, method = %request.method, url = %url, "Sending upstream request");

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, service.timeout()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, service.timeout()))?
            .to_vec();

        Ok(OutboundResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = OutboundRequest::new(Method::POST, "/api/login")
            .with_body(serde_json::json!({"email": "a@b.c"}))
            .with_authorization("Bearer t");
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.authorization.as_deref(), Some("Bearer t"));
        assert!(req.request_id.is_none());
        assert_eq!(OutboundRequest::get("/health").method, Method::GET);
    }

    #[test]
    fn test_response_classification() {
        let resp = OutboundResponse {
            status: 404,
            content_type: Some("application/json".into()),
            body: br#"{"message":"not found"}"#.to_vec(),
        };
        assert!(resp.is_client_error());
        assert!(!resp.is_server_error());
        assert_eq!(resp.json().unwrap()["message"], "not found");
    }
}
