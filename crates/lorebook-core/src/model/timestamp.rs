//! Lenient timestamp handling for persisted records.
//!
//! New records are written as RFC 3339 UTC. Older records carry naive local
//! ISO 8601 strings (no offset); those are read as local time. Anything else
//! falls back to "now" so that a single odd field never rejects a record.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

/// Parse an RFC 3339 or naive ISO 8601 timestamp.
pub fn parse_lenient(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = raw
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// `deserialize_with` helper: missing, null or unparseable values become now.
pub fn lenient<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_lenient).unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_lenient("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_naive_local() {
        let expected = Local
            .with_ymd_and_hms(2024, 3, 1, 10, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        let ts = parse_lenient("2024-03-01T10:00:00.000000").unwrap();
        assert_eq!(ts, expected);
        let spaced = parse_lenient("2024-03-01 10:00:00").unwrap();
        assert_eq!(spaced, expected);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_lenient("yesterday").is_none());
        assert!(parse_lenient("").is_none());
    }
}
