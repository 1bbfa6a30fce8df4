//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the resilience registry from configuration
//! - Register every service and storage tier with its probe
//! - Wire the client, resolver, writer and aggregator around it
//!
//! Backends start disconnected; [`Gateway::warm_up`] runs the first probe
//! sweep before traffic is accepted.

use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::health::{
    CacheProbe, DurableProbe, HealthAggregator, HealthMonitor, HttpProbe, ServiceHealthTracker,
};
use crate::redirect::{FallbackResolver, LinkWriter};
use crate::resilience::{ResilienceRegistry, ResilientClient, Transport};
use crate::storage::{CacheStore, DurableStore, CACHE_BACKEND, DURABLE_BACKEND};

/// Every shared component of a running gateway.
pub struct Gateway {
    pub config: GatewayConfig,
    pub registry: Arc<ResilienceRegistry>,
    pub client: ResilientClient,
    pub resolver: FallbackResolver,
    pub writer: LinkWriter,
    pub aggregator: HealthAggregator,
}

impl Gateway {
    pub fn build(
        config: GatewayConfig,
        cache: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let probe_timeout = Duration::from_secs(config.health_check.timeout_secs);
        let registry = Arc::new(ResilienceRegistry::new(config.circuit_breaker));

        for service in &config.services {
            let probe = HttpProbe::new(service.endpoint(&config.health_check.path));
            registry.register_service(&service.name, Arc::new(probe), probe_timeout);
        }
        registry.register_store(
            CACHE_BACKEND,
            Arc::new(CacheProbe(cache.clone())),
            probe_timeout,
            Some(config.storage.cache.reconnect),
        );
        registry.register_store(
            DURABLE_BACKEND,
            Arc::new(DurableProbe(durable.clone())),
            probe_timeout,
            None,
        );

        let health = registry.health().clone();
        let client = ResilientClient::new(
            registry.clone(),
            &config.services,
            transport,
            config.retries.clone(),
        );
        let resolver = FallbackResolver::new(
            cache.clone(),
            durable.clone(),
            health.clone(),
            config.storage.cache.key_prefix.clone(),
            Duration::from_millis(config.storage.cache.timeout_ms),
            Duration::from_millis(config.storage.durable.timeout_ms),
        );
        let writer = LinkWriter::new(
            cache,
            durable,
            health.clone(),
            config.storage.cache.key_prefix.clone(),
        );
        let aggregator = HealthAggregator::new(health, probe_timeout);

        tracing::info!(
            services = config.services.len(),
            backends = registry.health().names().len(),
            "Gateway components initialized"
        );

        Self {
            config,
            registry,
            client,
            resolver,
            writer,
            aggregator,
        }
    }

    pub fn health(&self) -> &ServiceHealthTracker {
        self.registry.health()
    }

    /// First probe sweep. Unreachable backends are logged, not fatal.
    pub async fn warm_up(&self) {
        for (name, healthy) in self.health().probe_all().await {
            if healthy {
                tracing::info!(backend = %name, "Backend reachable at startup");
            } else {
                tracing::warn!(backend = %name, "Backend unreachable at startup");
            }
        }
    }

    pub fn monitor(&self) -> HealthMonitor {
        HealthMonitor::new(self.health().clone(), self.config.health_check.clone())
    }
}
