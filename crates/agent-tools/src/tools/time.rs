//! Parsing of the loosely formatted times assistants send.
//!
//! Offset-less values are wall-clock times in the assistant's zone.

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::ToolError;

/// A `startTime`-style argument: a whole local day or a precise instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeArg {
    /// Local midnight of the day and of the day after.
    Day {
        start: DateTime<FixedOffset>,
        next: DateTime<FixedOffset>,
    },
    Instant(DateTime<FixedOffset>),
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// The assistant's IANA zone, UTC when unset or unknown.
pub(crate) fn zone(name: Option<&str>) -> Tz {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.parse().unwrap_or_else(|_| {
            warn!(timezone = %name, "Unknown timezone, using UTC");
            Tz::UTC
        }),
        None => Tz::UTC,
    }
}

/// Accepts RFC 3339, offset-less date-times and bare dates. The last two
/// are read in `zone`.
pub(crate) fn parse_time(name: &str, raw: &str, zone: Tz) -> Result<TimeArg, ToolError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(TimeArg::Instant(dt));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(TimeArg::Instant(localize(name, naive, zone)?));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let next_date = date
            .succ_opt()
            .ok_or_else(|| ToolError::invalid(name, "date out of range"))?;
        return Ok(TimeArg::Day {
            start: local_midnight(name, date, zone)?,
            next: local_midnight(name, next_date, zone)?,
        });
    }
    Err(ToolError::invalid(
        name,
        format!("'{}' is not a date (YYYY-MM-DD) or ISO-8601 time", raw),
    ))
}

fn localize(name: &str, naive: NaiveDateTime, zone: Tz) -> Result<DateTime<FixedOffset>, ToolError> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.fixed_offset()),
        // Clocks went back: take the first occurrence.
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.fixed_offset()),
        LocalResult::None => Err(ToolError::invalid(
            name,
            format!("{} does not exist in {}", naive, zone),
        )),
    }
}

/// Some zones skip midnight on DST days; the day then starts an hour later.
fn local_midnight(name: &str, date: NaiveDate, zone: Tz) -> Result<DateTime<FixedOffset>, ToolError> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ToolError::invalid(name, "date out of range"))?;
    localize(name, midnight, zone).or_else(|_| localize(name, midnight + Duration::hours(1), zone))
}

impl TimeArg {
    pub(crate) fn start_ms(&self) -> i64 {
        match self {
            TimeArg::Day { start, .. } => start.timestamp_millis(),
            TimeArg::Instant(dt) => dt.timestamp_millis(),
        }
    }

    /// Last millisecond of the day, or 24 hours after an instant.
    pub(crate) fn end_of_range_ms(&self) -> i64 {
        match self {
            TimeArg::Day { next, .. } => next.timestamp_millis() - 1,
            TimeArg::Instant(dt) => dt.timestamp_millis() + Duration::days(1).num_milliseconds(),
        }
    }

    /// The instant, or an error naming the parameter for bare dates.
    pub(crate) fn instant(&self, name: &str) -> Result<DateTime<FixedOffset>, ToolError> {
        match self {
            TimeArg::Instant(dt) => Ok(*dt),
            TimeArg::Day { .. } => Err(ToolError::invalid(name, "a time of day is required")),
        }
    }
}
