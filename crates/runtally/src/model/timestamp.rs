//! ISO-8601 timestamp encoding shared by records, summaries, and postbacks.
//!
//! Timestamps are written as RFC 3339 with microsecond precision in UTC.
//! Reading is lenient: offset-less timestamps (as produced by workers that
//! only know local naive time) are accepted and taken as UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub type Timestamp = DateTime<Utc>;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[must_use]
pub fn format_iso8601(value: &Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_iso8601(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

pub mod iso8601 {
    use super::{format_iso8601, parse_iso8601, Deserialize, Deserializer, Serializer, Timestamp};

    pub fn serialize<S: Serializer>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_iso8601(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_iso8601(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp: {raw}")))
    }
}

pub mod iso8601_option {
    use super::{format_iso8601, parse_iso8601, Deserialize, Deserializer, Serializer, Timestamp};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&format_iso8601(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => parse_iso8601(&raw).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid ISO-8601 timestamp: {raw}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_offset_and_naive_forms() {
        let with_offset = parse_iso8601("2024-03-05T10:11:12.500+02:00").unwrap();
        assert_eq!(with_offset.hour(), 8);

        let naive = parse_iso8601("2024-03-05T10:11:12.123456").unwrap();
        assert_eq!(naive.day(), 5);
        assert_eq!(naive.hour(), 10);

        let spaced = parse_iso8601("2024-03-05 10:11:12").unwrap();
        assert_eq!(spaced.minute(), 11);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_iso8601("yesterday").is_none());
    }

    #[test]
    fn formats_with_microseconds_and_z() {
        let value = parse_iso8601("2024-03-05T10:11:12.5Z").unwrap();
        assert_eq!(format_iso8601(&value), "2024-03-05T10:11:12.500000Z");
    }
}
