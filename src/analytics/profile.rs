//! Hour-of-week baseline profiles
//!
//! Baseline readings are bucketed into the 168 hours of the week and each
//! populated bucket is reduced to a statistic. Buckets without baseline
//! samples stay empty; readings that fall into them are not evaluated.

use crate::analytics::{power_points, prepare_series};
use crate::core::Reading;
use crate::stats;
use crate::time::{hour_of_week, HOURS_PER_WEEK};
use chrono::NaiveDateTime;

/// Per-bucket statistics built from a baseline window
pub struct HourOfWeekProfile<T> {
    buckets: Vec<Option<T>>,
}

impl<T> HourOfWeekProfile<T> {
    /// Build a profile, reducing each populated bucket with `reduce`
    pub fn build<F>(baseline: &[Reading], reduce: F) -> Self
    where
        F: Fn(&[f64]) -> T,
    {
        let series = prepare_series(baseline);
        let grouped = stats::group_by(power_points(&series), |(ts, _)| hour_of_week(*ts));

        let mut buckets: Vec<Option<T>> = (0..HOURS_PER_WEEK).map(|_| None).collect();
        for (hour, points) in grouped {
            let values: Vec<f64> = points.iter().map(|(_, power)| *power).collect();
            buckets[hour] = Some(reduce(&values));
        }

        Self { buckets }
    }

    /// Statistics for the bucket a timestamp falls into
    pub fn get(&self, timestamp: NaiveDateTime) -> Option<&T> {
        self.bucket(hour_of_week(timestamp))
    }

    pub fn bucket(&self, hour_of_week: usize) -> Option<&T> {
        self.buckets.get(hour_of_week).and_then(|b| b.as_ref())
    }

    /// Number of buckets that have baseline samples
    pub fn populated(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }
}
