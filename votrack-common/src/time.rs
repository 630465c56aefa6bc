//! Timestamp utilities
//!
//! Timestamps are stored in SQLite as RFC 3339 text in UTC.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp for storage (millisecond precision, `Z` suffix)
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn from_db(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", s, e)))
}

/// Timestamp `seconds` from now
pub fn seconds_from_now(seconds: i64) -> DateTime<Utc> {
    now() + Duration::seconds(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_db_format_is_lexically_ordered() {
        let a = from_db("2026-03-01T10:00:00.000Z").unwrap();
        let b = a + Duration::milliseconds(1500);
        assert!(to_db(&a) < to_db(&b));
        assert_eq!(to_db(&a), "2026-03-01T10:00:00.000Z");
    }

    #[test]
    fn test_from_db_round_trip_and_rejects_garbage() {
        let ts = from_db("2026-10-18T08:30:15.250Z").unwrap();
        assert_eq!(from_db(&to_db(&ts)).unwrap(), ts);
        assert!(from_db("yesterday").is_err());
    }

    #[test]
    fn test_seconds_from_now() {
        let later = seconds_from_now(60);
        assert!(later > now());
    }
}
