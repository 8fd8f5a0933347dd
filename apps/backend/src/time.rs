//! Timestamp parsing and local-day handling at the HTTP boundary.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::error::{ApiError, Result};

/// Largest UTC offset in use (UTC+14 / UTC-12 fit inside this), in minutes.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Parse an optional RFC 3339 timestamp, falling back to `default`.
pub fn parse_timestamp(value: Option<&str>, default: DateTime<Utc>) -> Result<DateTime<Utc>> {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ApiError::InvalidArgument(format!("malformed timestamp '{raw}': {e}"))),
        None => Ok(default),
    }
}

/// Validate a client timezone offset in minutes.
///
/// Uses the JavaScript `getTimezoneOffset` convention: positive when local
/// time is behind UTC.
pub fn validate_offset(offset_minutes: i32) -> Result<i32> {
    if offset_minutes.abs() > MAX_OFFSET_MINUTES {
        return Err(ApiError::InvalidArgument(format!(
            "timezone_offset {offset_minutes} is outside -{MAX_OFFSET_MINUTES}..={MAX_OFFSET_MINUTES}"
        )));
    }
    Ok(offset_minutes)
}

/// Last instant of the caller's local calendar day containing `now`, in UTC.
pub fn end_of_local_day(now: DateTime<Utc>, offset_minutes: i32) -> Result<DateTime<Utc>> {
    let offset = Duration::minutes(i64::from(validate_offset(offset_minutes)?));
    let local = now.naive_utc() - offset;
    let next_midnight = local
        .date()
        .succ_opt()
        .ok_or_else(|| ApiError::InvalidArgument("date out of range".to_string()))?
        .and_time(NaiveTime::MIN);

    Ok((next_midnight + offset).and_utc() - Duration::microseconds(1))
}
