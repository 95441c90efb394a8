//! Parsing and formatting of the logger timestamp format.
//!
//! Both loggers stamp their rows as `YYYYMMDDTHH:MM:SS` in local wall-clock
//! time with no zone and no sub-second part, so timestamps are kept as
//! [`NaiveDateTime`] values.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::{PowerError, Result};

/// `strftime` pattern shared by both loggers.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H:%M:%S";

fn timestamp_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^\d{8}T\d{2}:\d{2}:[0-5]\d$").expect("regex is valid"))
}

/// Parse a `YYYYMMDDTHH:MM:SS` string.
///
/// The string must match the pattern exactly: zero-padded fields, no
/// surrounding whitespace, no fractional seconds and no offset. chrono alone
/// would accept unpadded fields and a leap second `:60`, so the shape is
/// checked first.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    if !timestamp_shape().is_match(s) {
        return Err(PowerError::TimestampParse(s.to_string()));
    }
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|_| PowerError::TimestampParse(s.to_string()))
}

/// Format a timestamp back into `YYYYMMDDTHH:MM:SS`.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Signed difference `later - earlier` in fractional seconds.
pub fn seconds_between(earlier: &NaiveDateTime, later: &NaiveDateTime) -> f64 {
    let delta = *later - *earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Serde adapter for fields stored in the logger timestamp format.
pub mod serde_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_valid_timestamp() {
        let ts = parse_timestamp("20240115T10:30:05").unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.day(), 15);
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.minute(), 30);
        assert_eq!(ts.second(), 5);
    }

    #[test]
    fn test_round_trip() {
        for s in [
            "20240115T10:30:05",
            "19991231T23:59:59",
            "20240229T00:00:00",
            "20250704T12:01:09",
        ] {
            let ts = parse_timestamp(s).unwrap();
            assert_eq!(format_timestamp(&ts), s);
        }
    }

    #[test]
    fn test_rejects_other_layouts() {
        for s in [
            "",
            "2024-01-15T10:30:05",
            "20240115 10:30:05",
            "20240115T10:30:05.123",
            "20240115T10:30:05Z",
            " 20240115T10:30:05",
            "20240115T10:30:05 ",
            "2024115T10:30:05",
            "20240115T1:30:05",
            "not a timestamp",
        ] {
            assert!(
                matches!(parse_timestamp(s), Err(PowerError::TimestampParse(_))),
                "expected rejection of {:?}",
                s
            );
        }
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(parse_timestamp("20240230T10:00:00").is_err());
        assert!(parse_timestamp("20241301T10:00:00").is_err());
        assert!(parse_timestamp("20240115T25:00:00").is_err());
        // chrono reads :60 as a leap second; the loggers never write one.
        assert!(parse_timestamp("20240115T10:00:60").is_err());
        assert!(parse_timestamp("20241231T23:59:60").is_err());
    }

    #[test]
    fn test_ordering_is_chronological() {
        let a = parse_timestamp("20240115T10:00:00").unwrap();
        let b = parse_timestamp("20240115T10:00:01").unwrap();
        let c = parse_timestamp("20240116T00:00:00").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_seconds_between() {
        let a = parse_timestamp("20240115T10:00:00").unwrap();
        let b = parse_timestamp("20240115T10:01:30").unwrap();
        assert!((seconds_between(&a, &b) - 90.0).abs() < 1e-9);
        assert!((seconds_between(&b, &a) + 90.0).abs() < 1e-9);

        let c = a + chrono::Duration::milliseconds(1_001);
        assert!((seconds_between(&a, &c) - 1.001).abs() < 1e-9);
    }
}
