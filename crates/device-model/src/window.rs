//! Playback time windows and the compact timestamp layout recorders expect.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use dvrgrid_common::error::{GridError, GridResult};

/// Hours of the day (UTC) sampled by a day-highlights wall.
pub const HIGHLIGHT_HOURS: [u32; 4] = [8, 12, 16, 20];

/// `YYYYMMDDTHHMMSSZ`, always UTC.
pub const COMPACT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A bounded span of recorded footage: `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    duration: Duration,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, duration: Duration) -> GridResult<Self> {
        if duration.is_zero() {
            return Err(GridError::time_window("duration must be positive"));
        }
        let delta = TimeDelta::from_std(duration)
            .map_err(|_| GridError::time_window(format!("duration {duration:?} is too large")))?;
        let end = start
            .checked_add_signed(delta)
            .ok_or_else(|| GridError::time_window("window end is out of range"))?;
        Ok(Self {
            start,
            duration,
            end,
        })
    }

    /// Parse an operator-supplied ISO-8601 start and attach a duration.
    pub fn parse(start: &str, duration: Duration) -> GridResult<Self> {
        Self::new(parse_timestamp(start)?, duration)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Format an instant as `YYYYMMDDTHHMMSSZ`.
pub fn format_compact(ts: &DateTime<Utc>) -> String {
    ts.format(COMPACT_TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYYMMDDTHHMMSSZ` timestamp back into UTC.
pub fn parse_compact(s: &str) -> GridResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, COMPACT_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| GridError::time_window(format!("invalid compact timestamp {s:?}: {e}")))
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts `YYYY-MM-DDTHH:MM[:SS[.fff]]` with an optional trailing `Z` or a
/// numeric offset, a space instead of `T`, or a bare date (midnight).
/// Timestamps without an offset are taken as UTC; offsets are converted.
pub fn parse_timestamp(input: &str) -> GridResult<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GridError::time_window("timestamp is empty"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .unwrap_or(trimmed);

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(dt.and_utc());
        }
    }

    if let Some(midnight) = NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(GridError::time_window(format!(
        "unrecognised timestamp {input:?}; expected YYYY-MM-DDTHH:MM:SS or YYYY-MM-DDTHH:MM:SSZ"
    )))
}

/// One playback window per [`HIGHLIGHT_HOURS`] entry on `date` (`YYYY-MM-DD`).
pub fn highlight_windows(date: &str, duration: Duration) -> GridResult<Vec<TimeWindow>> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
        GridError::time_window(format!("invalid date {date:?}: {e}; expected YYYY-MM-DD"))
    })?;
    HIGHLIGHT_HOURS
        .iter()
        .map(|hour| {
            let start = parse_timestamp(&format!("{}T{hour:02}:00:00Z", day.format("%Y-%m-%d")))?;
            TimeWindow::new(start, duration)
        })
        .collect()
}
