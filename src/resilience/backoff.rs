//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay to wait after failed attempt number `attempt` (1-based).
///
/// `base * 2^(attempt-1)`, capped at `max`, plus up to 10% jitter on top.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let exponential = 2u64.saturating_pow(attempt - 1);
    let capped_ms = base_ms.saturating_mul(exponential).min(max.as_millis() as u64);

    let jitter_range = capped_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter)
}
