//! Backend health subsystem.
//!
//! # Data Flow
//! ```text
//! Real call outcomes (resilience::client, redirect):
//!     → tracker.mark_success / mark_failure
//!
//! Periodic probes (active.rs):
//!     Interval tick
//!     → probe.rs check per backend
//!     → tracker.rs updates state.rs
//!
//! Cache failure (reconnect.rs):
//!     Bounded reconnect schedule
//!     → probe until connected or attempts exhausted
//!
//! Operator report (aggregator.rs):
//!     Fan out one probe per backend, settle all
//! ```
//!
//! # Design Decisions
//! - Health state is per-backend and owned by the tracker alone
//! - Probes never fail outward; every outcome lands in the record
//! - No flap damping: the record reflects the latest observation

pub mod active;
pub mod aggregator;
pub mod probe;
mod reconnect;
pub mod state;
pub mod tracker;

pub use active::HealthMonitor;
pub use aggregator::{HealthAggregator, ServiceReport};
pub use probe::{CacheProbe, DurableProbe, HealthProbe, HttpProbe, ProbeError};
pub use state::{BackendHealth, HealthStatus};
pub use tracker::ServiceHealthTracker;
