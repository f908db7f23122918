//! Timestamp utilities
//!
//! All persisted timestamps use one fixed RFC 3339 layout (UTC, millisecond
//! precision, `Z` suffix) so that string comparison in SQL matches
//! chronological order.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Parse an optional stored timestamp
pub fn from_db_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db).transpose()
}
