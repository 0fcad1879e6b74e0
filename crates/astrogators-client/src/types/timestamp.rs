/*
[INPUT]:  Timestamp strings from the backend, with or without a UTC offset
[OUTPUT]: `DateTime<Utc>` values for user and ally-code records
[POS]:    Data layer - lenient timestamp decoding shared by wire types
[UPDATE]: When the backend emits a new timestamp shape
*/

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one read as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
}

pub(crate) fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("2024-01-01T00:00:00Z", 0)]
    #[case("2024-01-01T02:00:00+02:00", 0)]
    #[case("2024-01-01T00:00:00", 0)]
    #[case("2024-01-01T00:00:00.123456", 123_456_000)]
    #[case("2024-01-01 00:00:00.5", 500_000_000)]
    fn test_parse_timestamp_accepts(#[case] raw: &str, #[case] nanos: u32) {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(i64::from(nanos));
        assert_eq!(parse_timestamp(raw), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-01T00:00:00")]
    fn test_parse_timestamp_rejects(#[case] raw: &str) {
        assert!(parse_timestamp(raw).is_none());
    }
}
