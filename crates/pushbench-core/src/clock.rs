//! Wall-clock helpers.

use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since `timestamp_ms`, clamped at zero.
pub fn millis_since(timestamp_ms: i64) -> u64 {
    u64::try_from(now_millis().saturating_sub(timestamp_ms)).unwrap_or(0)
}
