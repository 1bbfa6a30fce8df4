//! Configuration validation.
//!
//! Serde handles the syntax; this pass checks values that parse fine but
//! cannot work at runtime. All problems are returned, not just the first.

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("service '{name}' has invalid url '{url}': {reason}")]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for service in &config.services {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName);
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        match Url::parse(&service.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::InvalidUrl {
                name: service.name.clone(),
                url: service.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidUrl {
                name: service.name.clone(),
                url: service.url.clone(),
                reason: e.to_string(),
            }),
        }

        if service.timeout_ms == 0 {
            errors.push(ValidationError::Zero(format!("services.{}.timeout_ms", service.name)));
        }
        if service.retries == 0 {
            errors.push(ValidationError::Zero(format!("services.{}.retries", service.name)));
        }
    }

    let checks = [
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64),
        ("circuit_breaker.success_threshold", config.circuit_breaker.success_threshold as u64),
        ("circuit_breaker.open_duration_ms", config.circuit_breaker.open_duration_ms),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("storage.cache.timeout_ms", config.storage.cache.timeout_ms),
        ("storage.durable.timeout_ms", config.storage.durable.timeout_ms),
        ("listener.request_timeout_secs", config.listener.request_timeout_secs),
    ];
    for (field, value) in checks {
        if value == 0 {
            errors.push(ValidationError::Zero(field.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
