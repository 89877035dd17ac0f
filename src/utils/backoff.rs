//! Exponential backoff for lock acquisition and retried provider calls.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use std::time::Duration;

/// Delay before retry number `attempt` (0-based): 10ms, 20ms, 40ms... capped at 500ms.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay = STARTING_BACKOFF_DELAY_MS.saturating_mul(factor).min(MAX_BACKOFF_DELAY_MS);
    Duration::from_millis(delay)
}

/// Sleeps for [`backoff_delay`] and returns the next attempt number.
pub fn exponential_backoff_with_delay(attempt: u32) -> u32 {
    std::thread::sleep(backoff_delay(attempt));
    attempt.saturating_add(1)
}
