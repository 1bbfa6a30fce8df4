//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to a service:
//!     → registry.rs (breaker + health record for the backend)
//!     → client.rs (breaker gate, retry loop, per-attempt timeout)
//!     → backoff.rs (delay between attempts)
//!     → transport.rs (one attempt on the wire)
//! ```
//!
//! # Design Decisions
//! - Every outbound attempt has a deadline
//! - Retries only for connection-class errors, timeouts and 5xx
//! - Breaker state is per backend; backends never share a lock

pub mod backoff;
pub mod circuit_breaker;
pub mod client;
pub mod registry;
pub mod transport;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use client::{ResilientClient, RetryPolicy};
pub use registry::ResilienceRegistry;
pub use transport::{HttpTransport, OutboundRequest, OutboundResponse, Transport};
