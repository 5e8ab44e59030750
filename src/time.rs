//! Timestamp discipline: one timezone, one wire format.
//!
//! Every timestamp in the system is `DateTime<Utc>`. Storage and the
//! outbound records render RFC 3339 at second precision with a trailing
//! `Z`; the rendering is fixed-width, so lexicographic comparison of stored
//! text is chronological comparison.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;

use crate::error::{MonitorError, Result};

/// Renders `2026-03-01T09:00:00Z` style text. Sub-second precision is
/// dropped.
pub fn format_utc_seconds(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses stored timestamp text back to UTC. Offset forms are normalized to
/// the same instant in UTC.
pub fn parse_utc(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            MonitorError::FatalStorage(format!("malformed stored timestamp {text:?}: {err}"))
        })
}

/// Serde helper for outbound records.
pub fn serialize_utc_seconds<S>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_utc_seconds(*ts))
}
