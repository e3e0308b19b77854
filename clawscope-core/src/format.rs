//! Text and time helpers shared by projections.

use chrono::{DateTime, TimeZone, Utc};

/// Truncate to `max` characters, appending `...` when something was cut.
///
/// Counts characters rather than bytes so multi-byte task descriptions never
/// split inside a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Collapse whitespace runs and truncate, for one-line excerpts.
pub fn excerpt(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max)
}

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds to a UTC timestamp, if representable.
pub fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
