//! Explicitly constructed owner of per-backend resilience state.
//!
//! One [`CircuitBreaker`] per configured service and one health record per
//! backend (services and storage tiers). The registry is built once at
//! startup and shared by handle; nothing here is process-global.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CircuitBreakerConfig, ReconnectConfig};
use crate::health::{HealthProbe, ServiceHealthTracker};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

pub struct ResilienceRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    health: ServiceHealthTracker,
    breaker_config: CircuitBreakerConfig,
}

impl ResilienceRegistry {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            health: ServiceHealthTracker::new(),
            breaker_config,
        }
    }

    /// Register a remote service: a breaker plus a health record.
    pub fn register_service(
        &self,
        name: &str,
        probe: Arc<dyn HealthProbe>,
        probe_timeout: Duration,
    ) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::new(name, &self.breaker_config));
        self.breakers.insert(name.to_string(), breaker.clone());
        self.health.register(name, probe, probe_timeout);
        breaker
    }

    /// Register a storage tier. Tiers are health-tracked but not breaker-guarded.
    pub fn register_store(
        &self,
        name: &str,
        probe: Arc<dyn HealthProbe>,
        probe_timeout: Duration,
        reconnect: Option<ReconnectConfig>,
    ) {
        match reconnect {
            Some(policy) => self
                .health
                .register_with_reconnect(name, probe, probe_timeout, policy),
            None => self.health.register(name, probe, probe_timeout),
        }
    }

    pub fn breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.value().clone())
    }

    pub fn health(&self) -> &ServiceHealthTracker {
        &self.health
    }

    /// Breaker snapshots sorted by backend name.
    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::tracker::tests::SwitchProbe;
    use crate::resilience::circuit_breaker::CircuitState;

    #[test]
    fn test_services_get_breakers_stores_do_not() {
        let registry = ResilienceRegistry::new(CircuitBreakerConfig::default());
        registry.register_service("user", SwitchProbe::new(true), Duration::from_secs(1));
        registry.register_service("qr", SwitchProbe::new(true), Duration::from_secs(1));
        registry.register_store(
            "cache",
            SwitchProbe::new(true),
            Duration::from_secs(1),
            Some(ReconnectConfig::default()),
        );

        assert!(registry.breaker("user").is_some());
        assert!(registry.breaker("cache").is_none());
        assert_eq!(registry.health().names(), vec!["user", "qr", "cache"]);

        let snapshots = registry.breaker_snapshots();
        let names: Vec<_> = snapshots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["qr", "user"]);
        assert!(snapshots.iter().all(|s| s.state == CircuitState::Closed));
    }

    #[test]
    fn test_breaker_is_shared_instance() {
        let registry = ResilienceRegistry::new(CircuitBreakerConfig::default());
        let created = registry.register_service("user", SwitchProbe::new(true), Duration::from_secs(1));
        let looked_up = registry.breaker("user").unwrap();
        assert!(Arc::ptr_eq(&created, &looked_up));
    }
}
