//! After-hours energy waste
//!
//! Identifies consumption outside business hours that exceeds the level the
//! channel idles at, indicating equipment left running.

use crate::analytics::{power_points, prepare_series};
use crate::core::{AnalysisWindow, Channel, Config, ExcessInterval, Reading, WasteWindow};
use crate::pricing::{annualization_factor, CostModel};
use crate::stats;
use crate::time::{interval_hours, is_business_hours};

/// After-hours waste with the idle baseline taken from the report readings
///
/// Returns `None` when the excess is below `after_hours.min_excess_kwh`.
pub fn analyze_after_hours(
    channel: &Channel,
    readings: &[Reading],
    resolution_seconds: i64,
    window: &AnalysisWindow,
    config: &Config,
) -> Option<WasteWindow> {
    analyze_after_hours_with_baseline(channel, readings, readings, resolution_seconds, window, config)
}

/// After-hours waste with the idle baseline taken from separate readings
/// (normally the historical baseline window)
pub fn analyze_after_hours_with_baseline(
    channel: &Channel,
    readings: &[Reading],
    baseline_readings: &[Reading],
    resolution_seconds: i64,
    window: &AnalysisWindow,
    config: &Config,
) -> Option<WasteWindow> {
    let waste = measure_after_hours(
        channel,
        readings,
        baseline_readings,
        resolution_seconds,
        window,
        config,
    );

    if waste.excess_kwh < config.after_hours.min_excess_kwh {
        log::debug!(
            "After-hours excess on {} is {:.2} kWh, below {:.2} kWh",
            channel.channel_id,
            waste.excess_kwh,
            config.after_hours.min_excess_kwh
        );
        return None;
    }
    Some(waste)
}

/// Compute the after-hours figures without applying the materiality filter
pub fn measure_after_hours(
    channel: &Channel,
    readings: &[Reading],
    baseline_readings: &[Reading],
    resolution_seconds: i64,
    window: &AnalysisWindow,
    config: &Config,
) -> WasteWindow {
    let settings = &config.after_hours;
    let calendar = &config.business_hours;
    let cost = CostModel::new(&config.pricing);
    let hours = interval_hours(resolution_seconds);

    let baseline_values: Vec<f64> = power_points(&prepare_series(baseline_readings))
        .into_iter()
        .filter(|(ts, power)| !is_business_hours(*ts, calendar) && *power > settings.min_power_kw)
        .map(|(_, power)| power)
        .collect();
    let baseline_kw = stats::non_zero_percentile(&baseline_values, settings.baseline_percentile);

    let after_hours: Vec<_> = power_points(&prepare_series(readings))
        .into_iter()
        .filter(|(ts, _)| !is_business_hours(*ts, calendar))
        .collect();

    let mut total_kwh = 0.0;
    let mut excess_kwh = 0.0;
    let mut excess_intervals = Vec::new();

    for (timestamp, power_kw) in &after_hours {
        total_kwh += power_kw * hours;

        let excess_kw = (power_kw - baseline_kw).max(0.0);
        excess_kwh += excess_kw * hours;

        if excess_kw > settings.min_power_kw {
            excess_intervals.push(ExcessInterval {
                timestamp: *timestamp,
                power_kw: *power_kw,
                excess_kw,
                excess_kwh: excess_kw * hours,
            });
        }
    }

    excess_intervals.sort_by(|a, b| {
        b.excess_kw
            .partial_cmp(&a.excess_kw)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    excess_intervals.truncate(settings.max_detail_intervals);

    let powers: Vec<f64> = after_hours.iter().map(|(_, p)| *p).collect();
    let summary = stats::summarize(&powers);
    let excess_cost = cost.cost(excess_kwh);

    WasteWindow {
        channel_id: channel.channel_id.clone(),
        channel_name: channel.channel_name.clone(),
        baseline_kw,
        total_after_hours_kwh: total_kwh,
        excess_kwh,
        excess_cost,
        annualized_cost: excess_cost * annualization_factor(window.duration_seconds()),
        percent_of_total: if total_kwh > 0.0 {
            excess_kwh / total_kwh * 100.0
        } else {
            0.0
        },
        this_week_avg_power_kw: summary.mean,
        max_power_kw: summary.max,
        after_hours_intervals: after_hours.len(),
        excess_intervals,
    }
}

/// Highest excess first; ties keep their order
pub fn rank_waste_windows(windows: &mut [WasteWindow]) {
    windows.sort_by(|a, b| {
        b.excess_kwh
            .partial_cmp(&a.excess_kwh)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
