//! Timestamp utilities
//!
//! Instants are carried as milliseconds since the Unix epoch (`i64`), which is
//! what the listening-history API reports and what the database stores.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse an RFC 3339 timestamp (e.g. `2024-05-01T12:34:56.789Z`) into epoch milliseconds
pub fn parse_rfc3339_millis(value: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Convert epoch milliseconds to a UTC datetime
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Render epoch milliseconds as RFC 3339, falling back to the raw number when out of range
pub fn format_millis(millis: i64) -> String {
    match millis_to_datetime(millis) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => millis.to_string(),
    }
}

/// Render a duration in milliseconds as seconds with one decimal (`"1.5s"`)
pub fn format_duration_secs(duration_ms: u64) -> String {
    format!("{:.1}s", duration_ms as f64 / 1000.0)
}
