//! Retry delay schedule.

use std::time::Duration;

use rand::Rng;

/// Delay to sleep before retry number `attempt` (1-based).
///
/// The schedule doubles from the base: base, 2x, 4x, ... capped at `max_ms`,
/// plus 0-10% jitter so synchronized callers spread out.
pub fn retry_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let doubled = base_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
    let capped = doubled.min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}
