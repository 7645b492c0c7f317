use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, TimeDelta, Utc};
use serde::{de::Error, Deserialize, Deserializer, Serializer};

/// The current instant at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

// Timestamps are stored as fixed-width RFC 3339 strings (millisecond precision, `Z` suffix)
// so that string comparison in the database matches chronological order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

/// Accepts a bare `YYYY-MM-DD` date or an RFC 3339 timestamp (date part kept).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

pub fn format_hms(value: &TimeDelta) -> String {
    let total = value.num_seconds();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Parses `HH:MM:SS` or `HH:MM`. Hours may exceed 24.
pub fn parse_hms(value: &str) -> Option<TimeDelta> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    let numbers = parts
        .iter()
        .map(|part| part.parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()?;

    let (hours, minutes, seconds) = match numbers.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [h, m] => (*h, *m, 0),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    Some(TimeDelta::seconds(
        i64::from(hours) * 3600 + i64::from(minutes) * 60 + i64::from(seconds),
    ))
}

pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

pub mod timestamp_opt {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&format_timestamp(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw))),
            None => Ok(None),
        }
    }
}

/// Calendar dates, tolerant of a trailing time component on input.
pub mod date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{}'", raw)))
    }
}

pub mod hms {
    use super::*;

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_hms(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_hms(&raw).ok_or_else(|| D::Error::custom(format!("invalid duration '{}'", raw)))
    }
}

pub mod hms_opt {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<TimeDelta>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&format_hms(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<TimeDelta>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_hms(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid duration '{}'", raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let fractional = whole + TimeDelta::milliseconds(250);

        assert_eq!(format_timestamp(&whole), "2024-03-15T10:00:00.000Z");
        assert_eq!(format_timestamp(&fractional), "2024-03-15T10:00:00.250Z");
        assert!(format_timestamp(&whole) < format_timestamp(&fractional));
    }

    #[test]
    fn test_parse_timestamp_accepts_dates() {
        let parsed = parse_timestamp("2024-03-15").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        assert_eq!(
            parse_date("2024-03-16T00:00:00.000Z"),
            NaiveDate::from_ymd_opt(2024, 3, 16)
        );
        assert_eq!(parse_date("2024-03-16"), NaiveDate::from_ymd_opt(2024, 3, 16));
        assert!(parse_date("16/03/2024").is_none());
    }

    #[test]
    fn test_hms_round_trip() {
        let delta = parse_hms("02:30:05").unwrap();
        assert_eq!(delta.num_seconds(), 2 * 3600 + 30 * 60 + 5);
        assert_eq!(format_hms(&delta), "02:30:05");
        assert_eq!(parse_hms("01:15").unwrap().num_minutes(), 75);
    }

    #[test]
    fn test_hms_rejects_garbage() {
        assert!(parse_hms("1:75:00").is_none());
        assert!(parse_hms("abc").is_none());
        assert!(parse_hms("1:2:3:4").is_none());
    }
}
