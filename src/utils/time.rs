//! Time and timestamp utilities

use chrono::{DateTime, NaiveDate, Utc};

/// Get current Unix timestamp in seconds
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Current time as an RFC 3339 string, the format all API responses use
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Short chart label for a calendar day, e.g. "Mar 07"
pub fn day_label(date: NaiveDate) -> String {
    date.format("%b %d").to_string()
}

/// Calendar day a timestamp falls on (UTC)
pub fn day_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}
