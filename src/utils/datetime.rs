use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Formats accepted from the web app and admin input, tried in order after RFC 3339.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Current time in the textual form every backend stores.
///
/// Microsecond precision keeps lexical order equal to creation order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses an admin-supplied date. Naive values are taken as UTC; a bare date
/// means midnight.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("Date cannot be empty"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(anyhow!("Unrecognized date '{}', expected e.g. 2024-12-31 18:00", input))
}

/// Normalizes an optional end date to RFC 3339. Blank input means "no end date".
pub fn normalize_end_date(input: Option<&str>) -> Result<Option<String>> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let parsed = parse_datetime(raw)?;
            Ok(Some(parsed.to_rfc3339_opts(SecondsFormat::Secs, true)))
        }
        None => Ok(None),
    }
}

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%d.%m.%Y %H:%M UTC").to_string()
}

/// Pretty-prints a stored timestamp, passing unparseable text through.
pub fn format_stored(value: &str) -> String {
    parse_datetime(value)
        .map(|dt| format_datetime(&dt))
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_web_app_format() {
        let dt = parse_datetime("2024-12-31T18:30").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 12, 31));
        assert_eq!((dt.hour(), dt.minute()), (18, 30));
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let dt = parse_datetime("2024-06-01T12:00:00+03:00").unwrap();
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn test_parse_bare_date() {
        let dt = parse_datetime("2024-06-01").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_datetime("next friday").is_err());
        assert!(parse_datetime("   ").is_err());
    }

    #[test]
    fn test_normalize_end_date() {
        assert_eq!(normalize_end_date(None).unwrap(), None);
        assert_eq!(normalize_end_date(Some("")).unwrap(), None);
        assert_eq!(
            normalize_end_date(Some("2024-12-31 18:00")).unwrap().as_deref(),
            Some("2024-12-31T18:00:00Z")
        );
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let first = now_timestamp();
        let second = now_timestamp();
        assert!(first <= second);
    }

    #[test]
    fn test_format_stored_passthrough() {
        assert_eq!(format_stored("2024-12-31T18:00:00Z"), "31.12.2024 18:00 UTC");
        assert_eq!(format_stored("Saturday evening"), "Saturday evening");
    }
}
