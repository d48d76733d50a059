//! Statistics over interval data
//!
//! Every function tolerates empty input and returns 0 (or an empty result)
//! instead of failing, so one sparse channel never aborts a site report.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Basic descriptive statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

/// Quartiles and interquartile range
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Iqr {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

/// Statistics of one sliding window, tagged with the index of its last element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub index: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// A hole between two consecutive timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub actual_interval_seconds: i64,
    pub missing_intervals: i64,
}

/// Per-value outlier flags and the fence they were judged against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outliers {
    pub flags: Vec<bool>,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mean = mean(values);
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub fn summarize(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }

    let sorted = sorted(values);
    Summary {
        count: values.len(),
        sum: values.iter().sum(),
        mean: mean(values),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median: percentile_sorted(&sorted, 50.0),
        std_dev: std_dev(values),
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Linear interpolation between the two order statistics around `p/100 * (n-1)`
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Percentile (0-100) of the values, 0 when empty
pub fn percentile(values: &[f64], p: f64) -> f64 {
    percentile_sorted(&sorted(values), p)
}

pub fn iqr(values: &[f64]) -> Iqr {
    let sorted = sorted(values);
    let q1 = percentile_sorted(&sorted, 25.0);
    let q3 = percentile_sorted(&sorted, 75.0);

    Iqr { q1, q3, iqr: q3 - q1 }
}

/// Z-score, 0 when there is no spread
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 0.0;
    }
    (value - mean) / std_dev
}

/// Percentile over the strictly positive values only
///
/// True-off samples would otherwise drag an idle baseline down to zero.
pub fn non_zero_percentile(values: &[f64], p: f64) -> f64 {
    let non_zero: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    percentile(&non_zero, p)
}

/// Statistics over every run of `window_size` consecutive values
///
/// Produces `len - window_size + 1` entries in input order, or nothing
/// when the input is shorter than one window.
pub fn rolling_stats(values: &[f64], window_size: usize) -> Vec<RollingStats> {
    if window_size == 0 || values.len() < window_size {
        return Vec::new();
    }

    values
        .windows(window_size)
        .enumerate()
        .map(|(offset, window)| {
            let (min, max) = window
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
            RollingStats {
                index: offset + window_size - 1,
                mean: mean(window),
                std_dev: std_dev(window),
                min,
                max,
            }
        })
        .collect()
}

/// Find steps between consecutive timestamps longer than the expected interval
///
/// A step counts as a gap once it exceeds `expected * (1 + tolerance_fraction)`.
pub fn find_gaps(
    timestamps: &[NaiveDateTime],
    expected_interval_seconds: i64,
    tolerance_fraction: f64,
) -> Vec<Gap> {
    if expected_interval_seconds <= 0 {
        return Vec::new();
    }

    let expected = expected_interval_seconds as f64;
    let limit = expected * (1.0 + tolerance_fraction);

    timestamps
        .windows(2)
        .filter_map(|pair| {
            let actual = (pair[1] - pair[0]).num_seconds();
            if (actual as f64) > limit {
                Some(Gap {
                    start: pair[0],
                    end: pair[1],
                    actual_interval_seconds: actual,
                    missing_intervals: (actual as f64 / expected).round() as i64 - 1,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Flag values outside `[q1 - k*iqr, q3 + k*iqr]`
pub fn detect_outliers(values: &[f64], iqr_multiplier: f64) -> Outliers {
    let Iqr { q1, q3, iqr } = iqr(values);
    let lower_bound = q1 - iqr_multiplier * iqr;
    let upper_bound = q3 + iqr_multiplier * iqr;

    Outliers {
        flags: values
            .iter()
            .map(|v| *v < lower_bound || *v > upper_bound)
            .collect(),
        lower_bound,
        upper_bound,
    }
}

/// Completeness percentage (0-100), 0 when nothing was expected
pub fn completeness_pct(actual_count: u64, expected_count: u64) -> f64 {
    if expected_count == 0 {
        return 0.0;
    }
    actual_count as f64 / expected_count as f64 * 100.0
}

/// Group items by a derived key, keys in ascending order
pub fn group_by<T, K, F>(items: impl IntoIterator<Item = T>, key_fn: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key_fn(&item)).or_default().push(item);
    }
    groups
}
