//! Local-time window arithmetic
//!
//! All helpers take the owner's local wall-clock time. Offsets are fixed, so
//! every local time maps to exactly one UTC instant.

use chrono::{Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use herald_core::{QuietHours, Timestamp};

use crate::error::{Result, ScheduleError};

/// Owner-local wall-clock time for `now`
pub fn local_time(now: Timestamp, offset: FixedOffset) -> NaiveDateTime {
    now.with_timezone(&offset).naive_local()
}

/// UTC instant for an owner-local wall-clock time
pub fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> Timestamp {
    let shift = TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    (local - shift).and_utc()
}

/// End of the quiet-hours window containing `local`, or `None` if `local` is
/// outside the window
///
/// For a window that wraps midnight, an evening time ends on the next day and
/// an early-morning time ends on the same day.
pub fn quiet_window_end(quiet: &QuietHours, local: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
    if !quiet.contains(local.time()) {
        return Ok(None);
    }
    let date = if local.time() < quiet.end {
        local.date()
    } else {
        next_day(local.date())?
    };
    Ok(Some(date.and_time(quiet.end)))
}

/// Push `local` to the end of the quiet window if it falls inside one
pub fn outside_quiet_hours(quiet: Option<&QuietHours>, local: NaiveDateTime) -> Result<NaiveDateTime> {
    match quiet {
        Some(quiet) => Ok(quiet_window_end(quiet, local)?.unwrap_or(local)),
        None => Ok(local),
    }
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> Result<NaiveDate> {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).ok_or_else(|| out_of_range(date))
}

/// Next day's dispatch time for the daily digest covering `day`
pub fn daily_dispatch(day: NaiveDate, at: NaiveTime) -> Result<NaiveDateTime> {
    Ok(next_day(day)?.and_time(at))
}

/// Dispatch time in the week after the one starting on `week_start`
pub fn weekly_dispatch(week_start: NaiveDate, weekday: Weekday, at: NaiveTime) -> Result<NaiveDateTime> {
    let offset = 7 + u64::from(weekday.num_days_from_monday());
    let date = week_start
        .checked_add_days(Days::new(offset))
        .ok_or_else(|| out_of_range(week_start))?;
    Ok(date.and_time(at))
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt().ok_or_else(|| out_of_range(date))
}

fn out_of_range(date: NaiveDate) -> ScheduleError {
    ScheduleError::OutOfRange {
        local: date.to_string(),
    }
}
