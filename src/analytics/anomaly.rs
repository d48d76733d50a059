//! Anomaly detection against an hour-of-week IQR profile
//!
//! Each of the 168 hours of the week gets a threshold of `q3 + k * iqr` from
//! the baseline window. Report readings above the threshold of their hour are
//! flagged, and runs of consecutive flagged readings become events.

use crate::analytics::events::{classify_context, group_consecutive, max_gap_seconds};
use crate::analytics::profile::HourOfWeekProfile;
use crate::analytics::{power_points, prepare_series};
use crate::core::{AnomalyConfig, AnomalyEvent, BusinessHoursCalendar, Channel, Reading};
use crate::stats::{self, Iqr};
use crate::time::{interval_hours, is_business_hours};
use chrono::NaiveDateTime;

/// Baseline statistics of one hour-of-week bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketStats {
    pub median: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub quartiles: Iqr,
    pub threshold: f64,
}

impl BucketStats {
    pub fn from_values(values: &[f64], iqr_multiplier: f64) -> Self {
        let quartiles = stats::iqr(values);
        Self {
            median: stats::median(values),
            mean: stats::mean(values),
            std_dev: stats::std_dev(values),
            threshold: quartiles.q3 + iqr_multiplier * quartiles.iqr,
            quartiles,
        }
    }
}

struct Flagged {
    timestamp: NaiveDateTime,
    power_kw: f64,
    bucket: BucketStats,
}

/// Detect anomaly events for one channel
///
/// Readings whose hour-of-week bucket has no baseline samples are not
/// evaluated.
pub fn detect_anomalies(
    channel: &Channel,
    report_readings: &[Reading],
    baseline_readings: &[Reading],
    resolution_seconds: i64,
    calendar: &BusinessHoursCalendar,
    config: &AnomalyConfig,
) -> Vec<AnomalyEvent> {
    let profile = HourOfWeekProfile::build(baseline_readings, |values| {
        BucketStats::from_values(values, config.iqr_multiplier)
    });
    if profile.populated() == 0 {
        log::debug!("No anomaly baseline for {}", channel.channel_id);
        return Vec::new();
    }

    let flagged: Vec<Flagged> = power_points(&prepare_series(report_readings))
        .into_iter()
        .filter_map(|(timestamp, power_kw)| {
            let bucket = *profile.get(timestamp)?;
            (power_kw > bucket.threshold).then_some(Flagged {
                timestamp,
                power_kw,
                bucket,
            })
        })
        .collect();

    let hours = interval_hours(resolution_seconds);
    let runs = group_consecutive(
        flagged,
        |f| f.timestamp,
        max_gap_seconds(resolution_seconds, config.max_gap_intervals),
    );

    let mut events = Vec::new();
    for run in runs {
        if run.len() < config.min_consecutive_intervals {
            continue;
        }

        let excess_kw: Vec<f64> = run
            .iter()
            .map(|f| (f.power_kw - f.bucket.median).max(0.0))
            .collect();
        let excess_kwh: f64 = excess_kw.iter().map(|kw| kw * hours).sum();
        if excess_kwh < config.min_excess_kwh {
            continue;
        }

        let Some(peak) = run.iter().max_by(|a, b| {
            a.power_kw
                .partial_cmp(&b.power_kw)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            continue;
        };
        let (Some(first), Some(last)) = (run.first(), run.last()) else {
            continue;
        };

        events.push(AnomalyEvent {
            channel_id: channel.channel_id.clone(),
            channel_name: channel.channel_name.clone(),
            start: first.timestamp,
            end: last.timestamp,
            intervals: run.len(),
            peak_power_kw: peak.power_kw,
            excess_kwh,
            avg_excess_kw: stats::mean(&excess_kw),
            peak_z_score: stats::z_score(peak.power_kw, peak.bucket.mean, peak.bucket.std_dev),
            context: classify_context(run.iter().map(|f| is_business_hours(f.timestamp, calendar))),
        });
    }

    log::debug!("{} anomaly events on {}", events.len(), channel.channel_id);
    events
}
