//! Liveness probes.
//!
//! A probe is the cheapest call that proves a backend answers: `PING` for the
//! cache, `SELECT 1` for the durable store, `GET /health` for a microservice.
//! Timeouts are applied by the tracker, not by the probe.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::storage::{CacheStore, DurableStore, StorageError};

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

impl From<StorageError> for ProbeError {
    fn from(e: StorageError) -> Self {
        ProbeError(e.to_string())
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), ProbeError>;
}

/// `GET <url>` against an HTTP service; any 2xx is healthy.
///
/// Uses the same TLS-capable client stack as outbound calls, so `https`
/// services are probed over the scheme they are called on.
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("shortlink-gateway-health-check")
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { url, client }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .map_err(|e| ProbeError(format!("connection error: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError(format!("non-success status {}", response.status())))
        }
    }
}

/// `PING` against the cache tier.
pub struct CacheProbe(pub Arc<dyn CacheStore>);

#[async_trait]
impl HealthProbe for CacheProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        Ok(self.0.ping().await?)
    }
}

/// `SELECT 1` against the durable tier.
pub struct DurableProbe(pub Arc<dyn DurableStore>);

#[async_trait]
impl HealthProbe for DurableProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        Ok(self.0.ping().await?)
    }
}
