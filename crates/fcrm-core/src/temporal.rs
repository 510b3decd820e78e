//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only instant truncated to seconds precision.
//!
//! Derived fields (`stage_entered_at`, `lost_date`, ...) and audit records are
//! always stamped by the engine with a `Timestamp`, never taken from the
//! caller. Truncation to seconds keeps the value identical whether it is read
//! back from memory, JSON, or a `timestamptz` column.
//!
//! ## Parsing
//!
//! - [`Timestamp::parse()`] is strict: only the `Z` suffix is accepted.
//! - [`Timestamp::parse_lenient()`] accepts any RFC 3339 offset and converts
//!   to UTC. Used for client-supplied payload dates such as `demo_date`.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string with a mandatory `Z` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the string is not RFC 3339 or uses
    /// an explicit offset (even `+00:00`).
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, CoreError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Calendar year in UTC. Sequence scopes are keyed on this.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// This instant shifted by `delta` (negative deltas move backwards).
    pub fn offset_by(&self, delta: Duration) -> Self {
        Self(truncate_to_seconds(self.0 + delta))
    }

    /// Elapsed time from `earlier` to `self`.
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }

    /// Render as ISO8601 with Z suffix (e.g. `2025-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 15, 12, 30, 45).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(ts.to_iso8601(), "2025-03-15T12:30:45Z");
    }

    #[test]
    fn test_parse_requires_z() {
        assert!(Timestamp::parse("2025-01-15T12:00:00Z").is_ok());
        assert!(Timestamp::parse("2025-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2025-01-15").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_parse_lenient_converts_offset() {
        let ts = Timestamp::parse_lenient("2025-01-15T17:00:00+05:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2025-01-15T12:00:00Z");
    }

    #[test]
    fn test_year_is_utc_year() {
        // 23:30 on Dec 31 at -02:00 is already next year in UTC.
        let ts = Timestamp::parse_lenient("2025-12-31T23:30:00-02:00").unwrap();
        assert_eq!(ts.year(), 2026);
    }

    #[test]
    fn test_offset_and_since() {
        let base = Timestamp::parse("2025-06-01T00:00:00Z").unwrap();
        let later = base.offset_by(Duration::hours(49));
        assert_eq!(later.since(&base), Duration::hours(49));
        assert!(later > base);
    }

    #[test]
    fn test_serde_roundtrip() {
        let ts = Timestamp::parse("2025-01-15T12:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }
}
