//! Timestamp storage codec.
//!
//! Stored `date` fields are RFC 3339 with millisecond precision in UTC.
//! The previous client wrote a locale-formatted string instead
//! (`"Jun 25, 2024 at 1:23:45 PM GMT+5:30"`); [`parse_stored`] still
//! accepts that form so existing rows keep decoding.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::error::TimestampError;

/// Format a timestamp the way it is written to the store.
pub fn format_stored(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored `date` field: RFC 3339 first, legacy form as fallback.
pub fn parse_stored(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_legacy(raw)
}

/// Parse the medium-date/long-time form the original client stored,
/// e.g. `"Jun 25, 2024 at 1:23:45 PM GMT+5:30"`. The offset suffix is
/// optional (`"... PM GMT"` means UTC).
fn parse_legacy(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let unrecognized = || TimestampError::Unrecognized(raw.to_string());

    let (date_part, time_part) = raw.split_once(" at ").ok_or_else(unrecognized)?;

    let (clock, offset_secs) = match time_part.split_once(" GMT") {
        Some((clock, suffix)) => (clock, parse_gmt_offset(suffix).ok_or_else(unrecognized)?),
        None => (time_part, 0),
    };

    let date = NaiveDate::parse_from_str(date_part.trim(), "%b %d, %Y")
        .map_err(|_| unrecognized())?;
    let time = NaiveTime::parse_from_str(clock.trim(), "%I:%M:%S %p")
        .map_err(|_| unrecognized())?;

    let offset = FixedOffset::east_opt(offset_secs).ok_or_else(unrecognized)?;
    let local = date.and_time(time);
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(unrecognized)
}

/// `"+5:30"`, `"-08:00"`, `"+2"`, or empty (plain GMT) → offset seconds.
fn parse_gmt_offset(suffix: &str) -> Option<i32> {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return Some(0);
    }
    let (sign, digits) = match suffix.as_bytes().first()? {
        b'+' => (1, &suffix[1..]),
        b'-' => (-1, &suffix[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (digits.parse::<i32>().ok()?, 0),
    };
    Some(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc3339_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 25, 13, 23, 45).unwrap();
        let stored = format_stored(ts);
        assert_eq!(stored, "2024-06-25T13:23:45.000Z");
        assert_eq!(parse_stored(&stored).unwrap(), ts);
    }

    #[test]
    fn legacy_with_offset() {
        let parsed = parse_stored("Jun 25, 2024 at 1:23:45 PM GMT+5:30").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 6, 25, 7, 53, 45).unwrap()
        );
    }

    #[test]
    fn legacy_plain_gmt() {
        let parsed = parse_stored("Jan 2, 2023 at 9:05:01 AM GMT").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 1, 2, 9, 5, 1).unwrap());
    }

    #[test]
    fn legacy_negative_offset_without_minutes() {
        let parsed = parse_stored("Dec 31, 2023 at 11:00:00 PM GMT-5").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_stored("yesterday-ish").is_err());
        assert!(parse_stored("Jun 25, 2024 at half past noon").is_err());
    }
}
