//! Timestamp utilities

use chrono::{DateTime, TimeZone, Utc};

/// Current time as whole seconds since the Unix epoch
///
/// Provenance logs (`source_checked`) and `updated` fields store this form.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Convert epoch seconds back to a UTC timestamp, if in range
pub fn from_ts(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}
