//! Breaker-guarded, retrying client for downstream services.
//!
//! # Data Flow
//! ```text
//! call(backend, request)
//!     → breaker.execute (rejects at once when open)
//!         → attempt 1..=max_attempts
//!             → per-attempt timeout
//!             → retryable failure: backoff, next attempt
//!             → success / fatal / out of attempts: leave the loop
//!     → one outcome reported to the breaker
//! ```
//!
//! # Design Decisions
//! - The whole retry loop is one breaker attempt, so an exhausted call
//!   counts as a single failure
//! - An open circuit never consumes retry budget
//! - 4xx answers mean the dependency is up: breaker success, then
//!   surfaced as `FatalRequest`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RetryConfig, ServiceConfig};
use crate::error::{BreakerError, GatewayError, GatewayResult, TransportError};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::registry::ResilienceRegistry;
use crate::resilience::transport::{OutboundRequest, OutboundResponse, Transport};

/// Attempt budget for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

/// Terminal outcome of the retry loop.
#[derive(Debug)]
struct CallFailure {
    attempts: u32,
    error: TransportError,
}

pub struct ResilientClient {
    registry: Arc<ResilienceRegistry>,
    services: HashMap<String, ServiceConfig>,
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
}

impl ResilientClient {
    /// Every service must already be registered with `registry`.
    pub fn new(
        registry: Arc<ResilienceRegistry>,
        services: &[ServiceConfig],
        transport: Arc<dyn Transport>,
        retry: RetryConfig,
    ) -> Self {
        let services = services
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect();
        Self {
            registry,
            services,
            transport,
            retry,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    /// Call `backend` with its configured retry count.
    pub async fn call(
        &self,
        backend: &str,
        request: OutboundRequest,
    ) -> GatewayResult<OutboundResponse> {
        let service = self
            .service(backend)
            .ok_or_else(|| GatewayError::UnknownBackend(backend.to_string()))?;
        let policy = RetryPolicy {
            max_attempts: service.retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        };
        self.call_with(backend, request, policy).await
    }

    /// Call `backend` with an explicit attempt budget.
    pub async fn call_with(
        &self,
        backend: &str,
        request: OutboundRequest,
        policy: RetryPolicy,
    ) -> GatewayResult<OutboundResponse> {
        let service = self
            .service(backend)
            .ok_or_else(|| GatewayError::UnknownBackend(backend.to_string()))?;
        let breaker = self
            .registry
            .breaker(backend)
            .ok_or_else(|| GatewayError::UnknownBackend(backend.to_string()))?;

        let outcome = breaker
            .execute(|| self.run_attempts(service, &request, policy))
            .await;

        match outcome {
            Ok(response) if response.is_client_error() => Err(GatewayError::FatalRequest {
                backend: backend.to_string(),
                status: response.status,
                body: response.body_text(),
            }),
            Ok(response) => Ok(response),
            Err(BreakerError::Open { retry_after, .. }) => Err(GatewayError::CircuitOpen {
                backend: backend.to_string(),
                retry_after,
            }),
            Err(BreakerError::Inner(failure)) if failure.error.is_retryable() => {
                Err(GatewayError::RetryableTransport {
                    backend: backend.to_string(),
                    attempts: failure.attempts,
                    source: failure.error,
                })
            }
            Err(BreakerError::Inner(failure)) => Err(GatewayError::FatalRequest {
                backend: backend.to_string(),
                status: 502,
                body: failure.error.to_string(),
            }),
        }
    }

    async fn run_attempts(
        &self,
        service: &ServiceConfig,
        request: &OutboundRequest,
        policy: RetryPolicy,
    ) -> Result<OutboundResponse, CallFailure> {
        let max_attempts = policy.max_attempts.max(1);
        let max_delay = Duration::from_millis(self.retry.max_delay_ms);
        let timeout = service.timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match tokio::time::timeout(timeout, self.transport.send(service, request)).await {
                Ok(Ok(response)) if response.is_server_error() => Err(TransportError::ServerError {
                    status: response.status,
                    body: response.body_text(),
                }),
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(TransportError::Timeout(timeout)),
            };

            let error = match result {
                Ok(response) => {
                    metrics::record_upstream_attempt(&service.name, "success");
                    self.registry.health().mark_success(&service.name);
                    return Ok(response);
                }
                Err(error) => error,
            };

            metrics::record_upstream_attempt(&service.name, attempt_outcome(&error));

            if error.is_retryable() && attempt < max_attempts {
                let delay = calculate_backoff(attempt, policy.base_delay, max_delay);
                tracing::warn!(
                    backend = %service.name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Upstream attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            tracing::error!(
                backend = %service.name,
                attempts = attempt,
                error = %error,
                "Upstream call failed"
            );
            self.registry
                .health()
                .mark_failure(&service.name, &error.to_string());
            return Err(CallFailure {
                attempts: attempt,
                error,
            });
        }
    }
}

fn attempt_outcome(error: &TransportError) -> &'static str {
    match error {
        TransportError::Connect(_) => "connect_error",
        TransportError::Timeout(_) => "timeout",
        TransportError::ServerError { .. } => "server_error",
        TransportError::Other(_) => "error",
    }
}
