//! Timestamp utilities and the calendar-day policy
//!
//! All "today" decisions (duplicate checks, daily reports, the scheduled
//! reset) go through one [`DayPolicy`]: a fixed reference timezone given as
//! a UTC offset. A day window is `[local midnight, next local midnight)`.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use serde::Serialize;

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Half-open calendar-day interval `[start, end)` in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DailyWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Reference timezone for calendar-day computations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayPolicy {
    offset: FixedOffset,
}

impl DayPolicy {
    /// Policy for a fixed offset east of UTC, in minutes (Brasília is -180)
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60)).ok_or_else(|| {
            Error::Config(format!("UTC offset out of range: {} minutes", minutes))
        })?;
        Ok(Self { offset })
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `instant` in the reference timezone
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Window for a calendar date in the reference timezone
    ///
    /// Dates at the edge of the representable range have no window and are
    /// rejected as `InvalidInput`.
    pub fn window_for_date(&self, date: NaiveDate) -> Result<DailyWindow> {
        let start = self.to_utc(date.and_time(NaiveTime::MIN))?;
        let end = start
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| out_of_range(date))?;
        Ok(DailyWindow { date, start, end })
    }

    /// Window of the calendar day containing `instant`
    pub fn window_containing(&self, instant: DateTime<Utc>) -> Result<DailyWindow> {
        self.window_for_date(self.local_date(instant))
    }

    pub fn today(&self) -> Result<DailyWindow> {
        self.window_containing(now())
    }

    /// First instant strictly after `after` whose local wall-clock time is `at`
    pub fn next_occurrence(&self, after: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
        let local = self.local_date(after).and_time(at);
        match self.to_utc(local) {
            Ok(candidate) if candidate > after => candidate,
            Ok(candidate) => candidate
                .checked_add_signed(Duration::days(1))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Err(_) => DateTime::<Utc>::MAX_UTC,
        }
    }

    fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>> {
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        local
            .checked_sub_signed(shift)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| out_of_range(local.date()))
    }
}

fn out_of_range(date: NaiveDate) -> Error {
    Error::InvalidInput(format!("Date out of range: {}", date))
}

impl Default for DayPolicy {
    fn default() -> Self {
        Self::utc()
    }
}

/// Parse a `YYYY-MM-DD` report date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid date '{}': {}", s, e)))
}

/// Parse an `HH:MM` wall-clock time
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("Invalid time of day '{}': {}", s, e)))
}
