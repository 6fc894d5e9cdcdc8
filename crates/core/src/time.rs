//! Timestamp parsing shared by the resolver and thread labels.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Numeric timestamps above this are milliseconds since the epoch; at or
/// below it they are seconds.
pub const MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Display format for thread times, e.g. `Jan 5, 2024 3:07 PM`.
pub const LABEL_FORMAT: &str = "%b %-d, %Y %-I:%M %p";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 / RFC 3339 timestamp. Offset-less values are taken as
/// UTC; bare dates resolve to midnight; all-digit strings are epoch values.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<f64>().ok().and_then(from_epoch_number);
    }
    None
}

/// Interpret an epoch number as milliseconds (> 10^12) or seconds.
pub fn from_epoch_number(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value > MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    DateTime::from_timestamp_millis(millis as i64)
}

/// A JSON string or number as a timestamp.
pub fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp(raw),
        Value::Number(n) => n.as_f64().and_then(from_epoch_number),
        _ => None,
    }
}

pub fn format_label(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format(LABEL_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        assert_eq!(
            parse_timestamp("2024-03-01T12:30:00+02:00"),
            Some(utc(2024, 3, 1, 10, 30))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T10:30:00.123456Z").map(|d| d.timestamp()),
            Some(utc(2024, 3, 1, 10, 30).timestamp())
        );
    }

    #[test]
    fn naive_and_date_only_values_are_utc() {
        assert_eq!(parse_timestamp("2024-03-01 10:30:00"), Some(utc(2024, 3, 1, 10, 30)));
        assert_eq!(parse_timestamp("2024-03-01"), Some(utc(2024, 3, 1, 0, 0)));
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("  "), None);
    }

    #[test]
    fn epoch_numbers_disambiguate_seconds_and_millis() {
        let secs = from_epoch_number(1_700_000_000.0).unwrap();
        let millis = from_epoch_number(1_700_000_000_000.0).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(secs.timestamp(), 1_700_000_000);

        // Exactly 10^12 is still seconds.
        assert!(from_epoch_number(MILLIS_THRESHOLD).unwrap().timestamp() > 1_700_000_000);
        assert_eq!(from_epoch_number(-1.0), None);
    }

    #[test]
    fn json_values_map_to_timestamps() {
        assert_eq!(
            timestamp_from_value(&json!(1_700_000_000)),
            from_epoch_number(1_700_000_000.0)
        );
        assert_eq!(
            timestamp_from_value(&json!("2024-03-01")),
            Some(utc(2024, 3, 1, 0, 0))
        );
        assert_eq!(timestamp_from_value(&json!(true)), None);
    }

    #[test]
    fn label_format_matches_thread_list_style() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(format_label(utc(2024, 1, 5, 15, 7), offset), "Jan 5, 2024 3:07 PM");
        assert_eq!(format_label(utc(2024, 1, 5, 0, 45), offset), "Jan 5, 2024 12:45 AM");
    }
}
