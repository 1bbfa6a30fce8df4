//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Downstream microservices the gateway forwards to.
    pub services: Vec<ServiceConfig>,

    /// Circuit breaker thresholds shared by every service breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Cache and durable store settings.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            services: vec![
                ServiceConfig::new("user", "http://user-service:3001/"),
                ServiceConfig::new("shortener", "http://shortener-service:3002/"),
                ServiceConfig::new("qr", "http://qr-service:8000/"),
            ],
            circuit_breaker: CircuitBreakerConfig::default(),
            retries: RetryConfig::default(),
            health_check: HealthCheckConfig::default(),
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for an inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// A downstream service reachable through the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service identifier, also the breaker and health key.
    pub name: String,

    /// Base URL; request paths are appended to it.
    pub url: String,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_service_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum attempts per call (1 = no retry).
    #[serde(default = "default_service_retries")]
    pub retries: u32,
}

fn default_service_timeout_ms() -> u64 {
    5000
}

fn default_service_retries() -> u32 {
    3
}

impl ServiceConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            timeout_ms: default_service_timeout_ms(),
            retries: default_service_retries(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Join the base URL and a request path with exactly one slash between them.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Successes in half-open state needed to close the circuit again.
    pub success_threshold: u32,

    /// How long the circuit stays open before a probe is allowed, in milliseconds.
    pub open_duration_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_duration_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background probe ticker.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Timeout for a single probe in seconds.
    pub timeout_secs: u64,

    /// Path probed on HTTP services.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            path: "/health".to_string(),
        }
    }
}

/// Storage tier configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cache: CacheConfig,
    pub durable: DurableConfig,
}

/// Cache tier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Timeout for a single cache command in milliseconds.
    pub timeout_ms: u64,

    /// Prefix prepended to short codes to form cache keys.
    pub key_prefix: String,

    /// Reconnect policy applied after a cache failure.
    pub reconnect: ReconnectConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            key_prefix: "shorturl:".to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Bounded reconnect schedule: delay = min(attempt * step, max_delay).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub step_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            step_ms: 50,
            max_delay_ms: 3000,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.step_ms.saturating_mul(attempt as u64).min(self.max_delay_ms))
    }
}

/// Durable tier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DurableConfig {
    /// Timeout for a single durable store query in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DurableConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
