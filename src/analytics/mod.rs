//! Interval analytics: sensor health, after-hours waste, anomalies, spikes
//! and the quick wins derived from them.
//!
//! Every analyzer is a free function over borrowed input that builds fresh
//! output values; nothing is cached between calls.

pub mod after_hours;
pub mod anomaly;
pub mod events;
pub mod profile;
pub mod quick_wins;
pub mod sensor_health;
pub mod spike;

use crate::core::Reading;
use chrono::NaiveDateTime;

pub use after_hours::{analyze_after_hours, analyze_after_hours_with_baseline, rank_waste_windows};
pub use anomaly::detect_anomalies;
pub use events::{by_channel, sort_chronologically, ChannelEvent};
pub use quick_wins::{generate_quick_wins, rank_quick_wins, Findings};
pub use sensor_health::{analyze_sensor_health, sort_by_severity, summarize_sensor_health, SensorHealthSummary};
pub use spike::detect_spikes;

/// Order readings by timestamp and drop duplicate timestamps
///
/// The sort is stable, so among readings sharing a timestamp the one seen
/// last in the input wins.
pub fn prepare_series(readings: &[Reading]) -> Vec<Reading> {
    let mut ordered = readings.to_vec();
    ordered.sort_by_key(|r| r.timestamp);

    let mut series: Vec<Reading> = Vec::with_capacity(ordered.len());
    for reading in ordered {
        match series.last_mut() {
            Some(last) if last.timestamp == reading.timestamp => *last = reading,
            _ => series.push(reading),
        }
    }
    series
}

/// `(timestamp, power)` for every reading that carries a finite power value
pub fn power_points(series: &[Reading]) -> Vec<(NaiveDateTime, f64)> {
    series
        .iter()
        .filter_map(|r| r.power_kw.filter(|p| p.is_finite()).map(|p| (r.timestamp, p)))
        .collect()
}
