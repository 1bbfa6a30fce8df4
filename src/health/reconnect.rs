//! Bounded reconnect schedule.
//!
//! After a failure on a backend with a [`ReconnectConfig`], one task probes
//! it with a growing delay (`min(attempt * step, max_delay)`). When the
//! attempts run out the backend is flagged `reconnect_exhausted` and stays
//! down until a later probe (usually the periodic monitor) succeeds.

use crate::config::ReconnectConfig;
use crate::health::tracker::ServiceHealthTracker;

pub(crate) async fn run(tracker: ServiceHealthTracker, name: String, policy: ReconnectConfig) {
    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay(attempt);
        tracing::info!(
            backend = %name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );
        tokio::time::sleep(delay).await;

        if tracker.is_connected(&name) || tracker.probe(&name).await {
            tracing::info!(backend = %name, attempt, "Reconnected");
            tracker.finish_reconnect(&name, true);
            return;
        }
    }

    tracing::warn!(
        backend = %name,
        attempts = policy.max_attempts,
        "Max reconnection attempts reached, marking as disconnected"
    );
    tracker.finish_reconnect(&name, false);
}
