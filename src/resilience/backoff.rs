//! Exponential backoff with jitter for config polling.

use std::time::Duration;
use rand::Rng;

/// Delay before the next poll after `failures` consecutive errors.
///
/// Zero failures means the regular interval. The delay doubles per failure,
/// is capped at `max`, then up to 10% jitter is added.
pub fn poll_backoff(failures: u32, interval: Duration, max: Duration) -> Duration {
    if failures == 0 {
        return interval;
    }

    let factor = 2u32.saturating_pow(failures.saturating_sub(1).min(16));
    let capped = interval.saturating_mul(factor).min(max);

    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped + Duration::from_millis(jitter)
}
