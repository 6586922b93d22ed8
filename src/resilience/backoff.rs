//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `retry_index` (0 for the first retry).
///
/// `initial * factor^retry_index`, capped at `max`, plus up to
/// `jitter_ratio` of the capped delay chosen at random.
pub fn calculate_backoff(
    retry_index: u32,
    initial: Duration,
    factor: f64,
    max: Duration,
    jitter_ratio: f64,
) -> Duration {
    let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
    let scaled_ms = initial.as_millis() as f64 * factor.max(1.0).powi(exponent);
    let capped_ms = scaled_ms.min(max.as_millis() as f64).max(0.0) as u64;

    let jitter_range = (capped_ms as f64 * jitter_ratio.clamp(0.0, 1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_ms.saturating_add(jitter))
}
