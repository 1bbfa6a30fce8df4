//! Fan-out health report.
//!
//! Every backend is probed in its own task under a shared deadline. A probe
//! that errors, panics or hangs yields an `offline` entry for that backend
//! only; the report always has one entry per requested backend, in order.
//! A backend reported offline is also recorded as failed on the tracker, so
//! `/status` and tier gating agree with the report.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::time::Duration;

use crate::health::state::HealthStatus;
use crate::health::tracker::ServiceHealthTracker;

/// One row of the `/health` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceReport {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl ServiceReport {
    fn offline(name: String, error: String) -> Self {
        Self {
            name,
            status: HealthStatus::Offline,
            error: Some(error),
            last_checked_at: Some(Utc::now()),
        }
    }
}

pub struct HealthAggregator {
    tracker: ServiceHealthTracker,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(tracker: ServiceHealthTracker, timeout: Duration) -> Self {
        Self { tracker, timeout }
    }

    pub async fn check_all(&self, backends: &[String]) -> Vec<ServiceReport> {
        let checks = backends.iter().cloned().map(|name| {
            let tracker = self.tracker.clone();
            let deadline = self.timeout;
            async move {
                let probe_name = name.clone();
                let probe_tracker = tracker.clone();
                let mut handle = tokio::spawn(async move { probe_tracker.probe(&probe_name).await });

                match tokio::time::timeout(deadline, &mut handle).await {
                    Ok(Ok(_)) => match tracker.health(&name) {
                        Some(health) => ServiceReport {
                            status: health.status(),
                            error: health.last_error,
                            last_checked_at: health.last_checked_at,
                            name,
                        },
                        None => ServiceReport::offline(name, "unknown backend".to_string()),
                    },
                    Ok(Err(e)) => {
                        tracing::error!(backend = %name, error = %e, "Health probe task failed");
                        ServiceReport::offline(name, "probe panicked".to_string())
                    }
                    Err(_) => {
                        handle.abort();
                        let error = format!("health check timed out after {}ms", deadline.as_millis());
                        tracing::warn!(backend = %name, timeout_ms = deadline.as_millis() as u64, "Health probe timed out");
                        // The aborted probe never recorded its own outcome.
                        tracker.mark_failure(&name, &error);
                        ServiceReport::offline(name, error)
                    }
                }
            }
        });

        join_all(checks).await
    }
}
