//! Serde helpers shared by `Settings` and the persisted row types.
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

/// Deserializes a human string ("30s", "2m", "500ms") into a `std::time::Duration`.
pub fn string_duration<'de, D>(deserializer: D) -> Result<core::time::Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let val: String = Deserialize::deserialize(deserializer)?;
    parse_duration::parse(&val).map_err(DeError::custom)
}

pub fn string_duration_opt<'de, D>(deserializer: D) -> Result<Option<core::time::Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<String> = Deserialize::deserialize(deserializer)?;
    val.map(|v| parse_duration::parse(&v).map_err(DeError::custom)).transpose()
}

/// UTC timestamp format used for `candles`/`signals` row display and CSV export.
pub mod date_time_format {
    use super::*;

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<i64>()
            .ok()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .or_else(|| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc)))
            .ok_or_else(|| DeError::custom(format!("invalid timestamp: {s}")))
    }
}

/// Parses a decimal price/quantity string, rejecting NaN-ish blanks instead of
/// silently coercing them to zero — money fields must be explicit.
pub fn parse_decimal(s: &str) -> Result<Decimal, rust_decimal::Error> { Decimal::from_str(s) }

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct WithDuration {
        #[serde(deserialize_with = "string_duration")]
        period: core::time::Duration,
    }

    #[test]
    fn string_duration_parses_human_shorthand() {
        let parsed: WithDuration = serde_json::from_str(r#"{"period": "30s"}"#).unwrap();
        assert_eq!(parsed.period, core::time::Duration::from_secs(30));
    }

    #[test]
    fn string_duration_rejects_unparseable_input() {
        let result: Result<WithDuration, _> = serde_json::from_str(r#"{"period": "not a duration"}"#);
        assert!(result.is_err());
    }

    #[derive(serde::Deserialize)]
    struct WithTimestamp {
        #[serde(with = "date_time_format")]
        at: DateTime<Utc>,
    }

    #[test]
    fn date_time_format_accepts_millis_since_epoch() {
        let parsed: WithTimestamp = serde_json::from_str(r#"{"at": "1700000000000"}"#).unwrap();
        assert_eq!(parsed.at.timestamp_millis(), 1700000000000);
    }

    #[test]
    fn date_time_format_accepts_rfc3339_as_a_fallback() {
        let parsed: WithTimestamp = serde_json::from_str(r#"{"at": "2023-11-14T22:13:20Z"}"#).unwrap();
        assert_eq!(parsed.at.timestamp_millis(), 1700000000000);
    }

    #[test]
    fn parse_decimal_rejects_blank_input() {
        assert!(parse_decimal("").is_err());
    }
}
