//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: open_duration elapsed, next call goes through
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! State, counters and the reopen deadline live behind one mutex so a reader
//! never sees `Open` paired with a stale deadline. The lock is never held
//! across the guarded operation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::BreakerError;
use crate::observability::metrics;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_attempt_at: Instant,
}

/// Point-in-time view of a breaker, as reported on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Wall-clock time at which an open circuit admits the next probe.
    pub next_attempt_at: Option<DateTime<Utc>>,
}

/// Per-backend circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    open_duration: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let name = name.into();
        tracing::debug!(
            backend = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            open_duration_ms = config.open_duration_ms,
            "Circuit breaker initialized"
        );
        metrics::record_breaker_state(&name, CircuitState::Closed as u8);
        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            open_duration: config.open_duration(),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                next_attempt_at: Instant::now(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Run `operation` unless the circuit is open.
    ///
    /// A real failure is returned unchanged as [`BreakerError::Inner`]; only a
    /// pre-emptive rejection produces [`BreakerError::Open`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Gate check. Moves an expired open circuit to half-open.
    fn try_acquire<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let now = Instant::now();
        if now < inner.next_attempt_at {
            let retry_after = inner.next_attempt_at - now;
            drop(inner);
            metrics::record_breaker_rejection(&self.name);
            tracing::debug!(backend = %self.name, "Circuit open, rejecting call");
            return Err(BreakerError::Open {
                name: self.name.clone(),
                retry_after,
            });
        }

        inner.state = CircuitState::HalfOpen;
        inner.success_count = 0;
        drop(inner);
        self.log_transition(CircuitState::HalfOpen);
        Ok(())
    }

    /// Record a successful call.
    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= self.success_threshold {
                inner.state = CircuitState::Closed;
                inner.success_count = 0;
                drop(inner);
                self.log_transition(CircuitState::Closed);
            }
        }
    }

    /// Record a failed call. A half-open failure reopens immediately.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        let probe_failed = inner.state == CircuitState::HalfOpen;
        if probe_failed || inner.failure_count >= self.failure_threshold {
            inner.state = CircuitState::Open;
            inner.next_attempt_at = Instant::now() + self.open_duration;
            let failures = inner.failure_count;
            drop(inner);
            tracing::warn!(
                backend = %self.name,
                failures,
                probe_failed,
                open_for_ms = self.open_duration.as_millis() as u64,
                "Circuit breaker opened"
            );
            metrics::record_breaker_state(&self.name, CircuitState::Open as u8);
        }
    }

    fn log_transition(&self, to: CircuitState) {
        tracing::info!(backend = %self.name, state = ?to, "Circuit breaker transitioned");
        metrics::record_breaker_state(&self.name, to as u8);
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let next_attempt_at = (inner.state == CircuitState::Open).then(|| {
            let remaining = inner.next_attempt_at.saturating_duration_since(Instant::now());
            Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_default()
        });
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            next_attempt_at,
        }
    }
}
