//! Business-calendar and period helpers
//!
//! All timestamps are wall-clock times in the analysis timezone. Weekdays
//! are numbered Monday = 0 through Sunday = 6, both here and in the
//! hour-of-week buckets used by the anomaly and spike baselines.

use crate::core::{AnalysisWindow, BusinessHoursCalendar, Error, Result};
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};

/// Number of hour-of-week buckets
pub const HOURS_PER_WEEK: usize = 168;

pub const SECONDS_PER_WEEK: i64 = 7 * 24 * 3600;

/// Check if a timestamp falls inside the calendar's business hours
pub fn is_business_hours(timestamp: NaiveDateTime, calendar: &BusinessHoursCalendar) -> bool {
    match calendar.hours_for(timestamp.weekday()) {
        Some(hours) => hours.contains_hour(timestamp.hour()),
        None => false,
    }
}

/// Number of samples a fully populated `[start, end)` period holds
pub fn expected_sample_count(
    start: NaiveDateTime,
    end: NaiveDateTime,
    resolution_seconds: i64,
) -> Result<u64> {
    if end <= start {
        return Err(Error::InvalidWindow(format!(
            "window end {} is not after start {}",
            end, start
        )));
    }
    if resolution_seconds <= 0 {
        return Err(Error::InvalidWindow(format!(
            "resolution must be positive, got {}s",
            resolution_seconds
        )));
    }

    Ok(((end - start).num_seconds() / resolution_seconds) as u64)
}

/// Hour-of-week bucket in `0..168`, Monday 00:00 = 0
pub fn hour_of_week(timestamp: NaiveDateTime) -> usize {
    timestamp.weekday().num_days_from_monday() as usize * 24 + timestamp.hour() as usize
}

/// Interval duration in hours
pub fn interval_hours(resolution_seconds: i64) -> f64 {
    resolution_seconds as f64 / 3600.0
}

/// The last full Monday-to-Monday week before the week containing `reference`
pub fn last_complete_week(reference: NaiveDateTime) -> AnalysisWindow {
    let date = reference.date();
    let this_monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    let start = (this_monday - Duration::days(7)).and_time(NaiveTime::MIN);

    AnalysisWindow {
        start,
        end: start + Duration::days(7),
    }
}

/// Baseline window of `periods` report lengths ending where the report starts
pub fn baseline_window(report: &AnalysisWindow, periods: u32) -> AnalysisWindow {
    let length = report.duration_seconds() * periods as i64;

    AnalysisWindow {
        start: report.start - Duration::seconds(length),
        end: report.start,
    }
}
