//! Per-backend connectivity tracking.
//!
//! # Responsibilities
//! - Own the [`BackendHealth`] record of every registered backend
//! - Record real call outcomes (`mark_success` / `mark_failure`)
//! - Run liveness probes that never fail outward
//! - Start the reconnect schedule for backends that have one
//!
//! Each record sits in its own `DashMap` entry, so an update is atomic per
//! backend and backends never contend with each other. Entry guards are
//! never held across an await.

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReconnectConfig;
use crate::health::probe::HealthProbe;
use crate::health::reconnect;
use crate::health::state::BackendHealth;
use crate::observability::metrics;

struct TrackedBackend {
    order: usize,
    health: BackendHealth,
    probe: Arc<dyn HealthProbe>,
    timeout: Duration,
    reconnect: Option<ReconnectConfig>,
    reconnecting: bool,
}

/// Shared handle to every backend's health record. Cloning is cheap.
#[derive(Clone, Default)]
pub struct ServiceHealthTracker {
    backends: Arc<DashMap<String, TrackedBackend>>,
    next_order: Arc<AtomicUsize>,
}

impl ServiceHealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend with its liveness probe and probe timeout.
    pub fn register(&self, name: &str, probe: Arc<dyn HealthProbe>, timeout: Duration) {
        self.insert(name, probe, timeout, None);
    }

    /// Register a backend that reconnects on its own after a failure.
    pub fn register_with_reconnect(
        &self,
        name: &str,
        probe: Arc<dyn HealthProbe>,
        timeout: Duration,
        policy: ReconnectConfig,
    ) {
        self.insert(name, probe, timeout, Some(policy));
    }

    fn insert(
        &self,
        name: &str,
        probe: Arc<dyn HealthProbe>,
        timeout: Duration,
        reconnect: Option<ReconnectConfig>,
    ) {
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        self.backends.insert(
            name.to_string(),
            TrackedBackend {
                order,
                health: BackendHealth::default(),
                probe,
                timeout,
                reconnect,
                reconnecting: false,
            },
        );
        tracing::debug!(backend = %name, reconnect = reconnect.is_some(), "Backend registered for health tracking");
    }

    /// Registered backend names in registration order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<(usize, String)> = self
            .backends
            .iter()
            .map(|entry| (entry.order, entry.key().clone()))
            .collect();
        names.sort_unstable();
        names.into_iter().map(|(_, name)| name).collect()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.backends
            .get(name)
            .map(|b| b.health.connected)
            .unwrap_or(false)
    }

    pub fn health(&self, name: &str) -> Option<BackendHealth> {
        self.backends.get(name).map(|b| b.health.clone())
    }

    pub fn snapshot(&self) -> BTreeMap<String, BackendHealth> {
        self.backends
            .iter()
            .map(|entry| (entry.key().clone(), entry.health.clone()))
            .collect()
    }

    /// Record a successful call or probe.
    pub fn mark_success(&self, name: &str) {
        let Some(mut backend) = self.backends.get_mut(name) else {
            tracing::debug!(backend = %name, "Success reported for untracked backend");
            return;
        };
        if backend.health.record_success() {
            tracing::info!(backend = %name, "Backend connected");
        }
        drop(backend);
        metrics::record_backend_health(name, true);
    }

    /// Record a failed call or probe, starting the reconnect schedule if the
    /// backend has one and it is not already running or exhausted.
    pub fn mark_failure(&self, name: &str, error: &str) {
        let Some(mut backend) = self.backends.get_mut(name) else {
            tracing::debug!(backend = %name, error, "Failure reported for untracked backend");
            return;
        };
        if backend.health.record_failure(error) {
            tracing::warn!(backend = %name, error, "Backend disconnected");
        } else {
            tracing::debug!(backend = %name, error, "Backend still disconnected");
        }

        let start_reconnect = match backend.reconnect {
            Some(policy) if !backend.reconnecting && !backend.health.reconnect_exhausted => {
                backend.reconnecting = true;
                Some(policy)
            }
            _ => None,
        };
        drop(backend);
        metrics::record_backend_health(name, false);

        if let Some(policy) = start_reconnect {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(reconnect::run(self.clone(), name.to_string(), policy));
                }
                Err(_) => self.finish_reconnect(name, true),
            }
        }
    }

    /// Close out a reconnect schedule. An exhausted schedule leaves the
    /// backend disconnected until a later probe succeeds.
    pub(crate) fn finish_reconnect(&self, name: &str, recovered: bool) {
        if let Some(mut backend) = self.backends.get_mut(name) {
            backend.reconnecting = false;
            if !recovered && !backend.health.connected {
                backend.health.reconnect_exhausted = true;
                backend.health.last_checked_at = Some(Utc::now());
            }
        }
    }

    /// Run the backend's liveness probe and record the outcome.
    ///
    /// Never fails: errors, timeouts and panics become a `false` result and
    /// an error on the health record.
    pub async fn probe(&self, name: &str) -> bool {
        let Some((probe, timeout)) = self
            .backends
            .get(name)
            .map(|b| (b.probe.clone(), b.timeout))
        else {
            tracing::warn!(backend = %name, "Probe requested for untracked backend");
            return false;
        };

        let outcome = AssertUnwindSafe(tokio::time::timeout(timeout, probe.check()))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(e.to_string()),
            Ok(Err(_)) => Some(format!("probe timed out after {}ms", timeout.as_millis())),
            Err(_) => Some("probe panicked".to_string()),
        };

        match failure {
            None => {
                self.mark_success(name);
                true
            }
            Some(error) => {
                self.mark_failure(name, &error);
                false
            }
        }
    }

    /// Probe every registered backend concurrently.
    pub async fn probe_all(&self) -> Vec<(String, bool)> {
        let names = self.names();
        join_all(names.into_iter().map(|name| async move {
            let healthy = self.probe(&name).await;
            (name, healthy)
        }))
        .await
    }
}
