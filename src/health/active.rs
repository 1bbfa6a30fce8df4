//! Periodic health probing.
//!
//! # Responsibilities
//! - Probe every registered backend on a fixed interval
//! - Keep `BackendHealth` fresh independently of request traffic
//! - Stop on the shutdown broadcast

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::tracker::ServiceHealthTracker;

pub struct HealthMonitor {
    tracker: ServiceHealthTracker,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(tracker: ServiceHealthTracker, config: HealthCheckConfig) -> Self {
        Self { tracker, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            backends = self.tracker.names().len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let results = self.tracker.probe_all().await;
                    let offline = results.iter().filter(|(_, ok)| !ok).count();
                    tracing::debug!(checked = results.len(), offline, "Health sweep complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::tracker::tests::SwitchProbe;
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn test_monitor_probes_on_interval_until_shutdown() {
        let tracker = ServiceHealthTracker::new();
        let probe = SwitchProbe::new(true);
        tracker.register("shortener", probe.clone(), Duration::from_secs(1));

        let (tx, rx) = broadcast::channel(1);
        let monitor = HealthMonitor::new(tracker.clone(), HealthCheckConfig::default());
        let handle = tokio::spawn(monitor.run(rx));

        // First tick fires immediately, then every 30s.
        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert!(tracker.is_connected("shortener"));

        tx.send(()).unwrap();
        handle.await.unwrap();

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns_immediately() {
        let config = HealthCheckConfig {
            enabled: false,
            ..HealthCheckConfig::default()
        };
        let (_tx, rx) = broadcast::channel(1);
        HealthMonitor::new(ServiceHealthTracker::new(), config).run(rx).await;
    }
}
