//! Demand spike detection
//!
//! A reading is a spike when it exceeds `max(p95 * multiplier, floor)` for its
//! hour of the week. The absolute floor depends on the channel class and keeps
//! idle submeters from tripping on trivial loads.

use crate::analytics::events::{classify_context, group_consecutive, max_gap_seconds};
use crate::analytics::profile::HourOfWeekProfile;
use crate::analytics::{power_points, prepare_series};
use crate::core::{BusinessHoursCalendar, Channel, ChannelKind, Reading, SpikeConfig, SpikeEvent};
use crate::stats;
use crate::time::{interval_hours, is_business_hours};
use chrono::NaiveDateTime;

struct Flagged {
    timestamp: NaiveDateTime,
    power_kw: f64,
    baseline_kw: f64,
    threshold_kw: f64,
}

impl SpikeConfig {
    /// Absolute minimum threshold for a channel class
    pub fn floor_kw(&self, kind: ChannelKind) -> f64 {
        match kind {
            ChannelKind::Submeter => self.submeter_min_kw,
            ChannelKind::SiteTotal => self.site_total_min_kw,
        }
    }

    pub fn threshold_kw(&self, baseline_kw: f64, kind: ChannelKind) -> f64 {
        (baseline_kw * self.multiplier).max(self.floor_kw(kind))
    }
}

/// Detect spike events for one channel
pub fn detect_spikes(
    channel: &Channel,
    report_readings: &[Reading],
    baseline_readings: &[Reading],
    resolution_seconds: i64,
    calendar: &BusinessHoursCalendar,
    config: &SpikeConfig,
) -> Vec<SpikeEvent> {
    let profile = HourOfWeekProfile::build(baseline_readings, |values| {
        stats::percentile(values, config.baseline_percentile)
    });
    if profile.populated() == 0 {
        log::debug!("No spike baseline for {}", channel.channel_id);
        return Vec::new();
    }

    let flagged: Vec<Flagged> = power_points(&prepare_series(report_readings))
        .into_iter()
        .filter_map(|(timestamp, power_kw)| {
            let baseline_kw = *profile.get(timestamp)?;
            let threshold_kw = config.threshold_kw(baseline_kw, channel.kind);
            (power_kw > threshold_kw).then_some(Flagged {
                timestamp,
                power_kw,
                baseline_kw,
                threshold_kw,
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
        if run.len() < config.min_duration_intervals {
            continue;
        }

        let (Some(first), Some(last)) = (run.first(), run.last()) else {
            continue;
        };
        let Some(peak) = run.iter().max_by(|a, b| {
            a.power_kw
                .partial_cmp(&b.power_kw)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            continue;
        };

        events.push(SpikeEvent {
            channel_id: channel.channel_id.clone(),
            channel_name: channel.channel_name.clone(),
            start: first.timestamp,
            end: last.timestamp,
            duration_seconds: (last.timestamp - first.timestamp).num_seconds(),
            intervals: run.len(),
            peak_power_kw: peak.power_kw,
            threshold_kw: peak.threshold_kw,
            total_excess_kwh: run
                .iter()
                .map(|f| (f.power_kw - f.baseline_kw).max(0.0) * hours)
                .sum(),
            context: classify_context(run.iter().map(|f| is_business_hours(f.timestamp, calendar))),
        });
    }

    log::debug!("{} spike events on {}", events.len(), channel.channel_id);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventContext;
    use chrono::{Duration, NaiveDate};

    const RESOLUTION: i64 = 900;

    fn report_start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn constant(start: NaiveDateTime, count: i64, power: f64) -> Vec<Reading> {
        (0..count)
            .map(|i| Reading::new(start + Duration::seconds(i * RESOLUTION), power))
            .collect()
    }

    fn baseline(power: f64) -> Vec<Reading> {
        constant(report_start() - Duration::days(14), 1344, power)
    }

    fn report(base: f64, overrides: &[(i64, f64)]) -> Vec<Reading> {
        let mut readings = constant(report_start(), 672, base);
        for (index, power) in overrides {
            readings[*index as usize] = Reading::new(readings[*index as usize].timestamp, *power);
        }
        readings
    }

    fn detect(channel: &Channel, report: &[Reading], baseline: &[Reading]) -> Vec<SpikeEvent> {
        detect_spikes(
            channel,
            report,
            baseline,
            RESOLUTION,
            &BusinessHoursCalendar::default(),
            &SpikeConfig::default(),
        )
    }

    #[test]
    fn test_floor_applies_to_idle_channel() {
        let meter = Channel::new("plug-7", "Plug Loads", "site-1");
        assert!(detect(&meter, &report(0.1, &[(200, 4.0)]), &baseline(0.1)).is_empty());

        let events = detect(&meter, &report(0.1, &[(200, 6.0)]), &baseline(0.1));
        assert_eq!(events.len(), 1);
        assert!((events[0].threshold_kw - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_site_total_floor() {
        let site = Channel::new("main", "Main Service", "site-1").with_kind(ChannelKind::SiteTotal);
        assert!(detect(&site, &report(0.1, &[(200, 6.0)]), &baseline(0.1)).is_empty());
    }

    #[test]
    fn test_relative_threshold_above_floor() {
        let meter = Channel::new("chiller", "Chiller", "site-1");

        assert!(detect(&meter, &report(10.0, &[(200, 14.0)]), &baseline(10.0)).is_empty());

        let events = detect(&meter, &report(10.0, &[(200, 16.0)]), &baseline(10.0));
        assert_eq!(events.len(), 1);
        assert!((events[0].threshold_kw - 15.0).abs() < 1e-9);
        assert!((events[0].total_excess_kwh - 6.0 * 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_run_duration_and_context() {
        let meter = Channel::new("rtu-1", "RTU 1", "site-1");
        // Wednesday 20:00 to 22:45
        let overrides: Vec<(i64, f64)> = (272..284).map(|i| (i, 6.0)).collect();

        let events = detect(&meter, &report(1.8, &overrides), &baseline(1.8));

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.intervals, 12);
        assert_eq!(event.duration_seconds, 11 * RESOLUTION);
        assert_eq!(event.context, EventContext::AfterHours);
        assert!((event.total_excess_kwh - 12.0 * 4.2 * 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_min_duration_filter() {
        let meter = Channel::new("rtu-1", "RTU 1", "site-1");
        let config = SpikeConfig {
            min_duration_intervals: 2,
            ..SpikeConfig::default()
        };

        let events = detect_spikes(
            &meter,
            &report(0.1, &[(200, 6.0)]),
            &baseline(0.1),
            RESOLUTION,
            &BusinessHoursCalendar::default(),
            &config,
        );
        assert!(events.is_empty());
    }
}
