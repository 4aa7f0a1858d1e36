//! Deterministic backoff for the DLQ retry loop.
//!
//! The retry loop's wait interval must be reproducible for a given `retryCount` (it is a
//! directly testable property), so this is a plain formula rather than the jittered
//! exponential-backoff executor pattern used for ordinary transient-fault retries elsewhere
//! in this lineage of services.

use std::time::Duration;

/// `baseDelayMs * 5^retryCount`, e.g. with the default `base_delay_ms = 5000`: `5000`,
/// `25000`, `125000` for `retryCount` `0`, `1`, `2`.
pub fn calculate_backoff(retry_count: u32, base_delay_ms: u64) -> Duration {
    let multiplier = 5u64.saturating_pow(retry_count);
    Duration::from_millis(base_delay_ms.saturating_mul(multiplier))
}
