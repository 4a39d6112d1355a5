use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use time::OffsetDateTime;

/// Convert a `time` instant into the site timezone.
pub fn localized_datetime(time: OffsetDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp(time.unix_timestamp(), time.nanosecond())
        .map(|utc| tz.from_utc_datetime(&utc.naive_utc()))
}

/// Parse the date shapes stored in content fields.
///
/// Accepts unix timestamps, RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`.
/// Naive values are read as wall-clock time in `tz`.
pub fn parse_stored_datetime(raw: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(seconds) = trimmed.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp(seconds, 0)
            .map(|utc| tz.from_utc_datetime(&utc.naive_utc()));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&tz));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    tz.from_local_datetime(&naive).earliest()
}
