//! General utilities.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in seconds, respecting `SOURCE_DATE_EPOCH`.
///
/// When `SOURCE_DATE_EPOCH` is set, returns that value instead of the actual
/// current time, which keeps "hours since last commit" deterministic in
/// tests and snapshots.
pub fn get_now() -> i64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0)
        })
}

/// Time elapsed between `timestamp` (Unix seconds) and `now`.
///
/// Commits dated in the future (clock skew) count as zero elapsed time.
pub fn elapsed_since(timestamp: i64, now: i64) -> Duration {
    Duration::from_secs(now.saturating_sub(timestamp).max(0) as u64)
}
