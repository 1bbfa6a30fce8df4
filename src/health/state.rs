//! Backend connectivity record.
//!
//! # State Transitions
//! ```text
//! Disconnected → Connected: any successful call or probe
//! Connected → Disconnected: a terminal call failure or a failed probe
//! ```
//!
//! There is no hysteresis: the record reflects the latest observed outcome,
//! which is what the fallback resolver needs to decide whether to try a tier.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Online/offline as reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Online,
    Offline,
}

/// Connectivity of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    pub connected: bool,
    pub last_error: Option<String>,
    /// `None` until the first call or probe completes.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Set once the reconnect schedule gave up; cleared by the next success.
    pub reconnect_exhausted: bool,
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self {
            connected: false,
            last_error: None,
            last_checked_at: None,
            reconnect_exhausted: false,
        }
    }
}

impl BackendHealth {
    pub fn status(&self) -> HealthStatus {
        if self.connected {
            HealthStatus::Online
        } else {
            HealthStatus::Offline
        }
    }

    /// Returns true when this flips the record to connected.
    pub(crate) fn record_success(&mut self) -> bool {
        let flipped = !self.connected;
        self.connected = true;
        self.last_error = None;
        self.last_checked_at = Some(Utc::now());
        self.reconnect_exhausted = false;
        flipped
    }

    /// Returns true when this flips the record to disconnected.
    pub(crate) fn record_failure(&mut self, error: &str) -> bool {
        let flipped = self.connected || self.last_checked_at.is_none();
        self.connected = false;
        self.last_error = Some(error.to_string());
        self.last_checked_at = Some(Utc::now());
        flipped
    }
}
