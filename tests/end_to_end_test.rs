use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use energy_brief_lib::core::{
    AnalysisWindow, Channel, ChannelInput, Config, EventContext, Priority, Reading, WinKind,
};
use energy_brief_lib::report::{analyze_site, analyze_site_concurrent, SiteInput};
use energy_brief_lib::time::baseline_window;

const RESOLUTION: i64 = 900;

/// Keeps quiet periods from looking like a stuck sensor
const RIPPLE: [f64; 4] = [-0.03, -0.01, 0.01, 0.03];

fn report_window() -> AnalysisWindow {
    let start = NaiveDate::from_ymd_opt(2024, 1, 8)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    AnalysisWindow::new(start, start + Duration::days(7)).unwrap()
}

fn is_spike_window(ts: NaiveDateTime) -> bool {
    ts.weekday().num_days_from_monday() == 2 && (20..23).contains(&ts.hour())
}

/// 2 kW in business hours, 1.8 kW after hours, optionally 6 kW on Wednesday
/// from 20:00 to 23:00
fn week(window: &AnalysisWindow, with_spike: bool) -> Vec<Reading> {
    let count = window.duration_seconds() / RESOLUTION;
    (0..count)
        .map(|i| {
            let ts = window.start + Duration::seconds(i * RESOLUTION);
            let business = ts.weekday().num_days_from_monday() < 5 && (7..18).contains(&ts.hour());
            let power = if with_spike && is_spike_window(ts) {
                6.0
            } else if business {
                2.0 + RIPPLE[(i % 4) as usize]
            } else {
                1.8 + RIPPLE[(i % 4) as usize]
            };
            Reading::new(ts, power)
        })
        .collect()
}

fn scenario() -> SiteInput {
    let report = report_window();
    let baseline = baseline_window(&report, 4);

    SiteInput::new("org-1", report, baseline).with_channel(ChannelInput {
        channel: Channel::new("rtu-1", "Rooftop Unit 1", "org-1"),
        resolution_seconds: RESOLUTION,
        report_readings: week(&report, true),
        baseline_readings: week(&baseline, false),
    })
}

#[test]
fn test_one_week_with_evening_spike() {
    let input = scenario();
    assert_eq!(input.channels[0].report_readings.len(), 672);

    let report = analyze_site(&input, &Config::default(), None).unwrap();

    // Complete and never flat, so no data quality findings
    assert!(report.issues.is_empty(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.sensor_health.total_issues, 0);
    assert!((report.channels[0].completeness_pct - 100.0).abs() < 1e-9);

    // 6 kW is above max(p95 * 1.5, 5 kW) = 5 kW
    assert_eq!(report.spikes.len(), 1);
    let spike = &report.spikes[0];
    let spike_start = report_window().start + Duration::days(2) + Duration::hours(20);
    assert_eq!(spike.start, spike_start);
    assert_eq!(spike.end, spike_start + Duration::minutes(165));
    assert_eq!(spike.intervals, 12);
    assert_eq!(spike.duration_seconds, 165 * 60);
    assert!((spike.threshold_kw - 5.0).abs() < 1e-9);
    assert_eq!(spike.context, EventContext::AfterHours);

    // The IQR threshold of those hours is about 1.9 kW, so the anomaly
    // detector fires on the same window
    assert_eq!(report.anomalies.len(), 1);
    let anomaly = &report.anomalies[0];
    assert_eq!(anomaly.start, spike.start);
    assert_eq!(anomaly.end, spike.end);
    assert!((anomaly.excess_kwh - 12.0 * 4.2 * 0.25).abs() < 1e-6);

    // Idle level stays near 1.8 kW and most of the excess is the spike
    assert_eq!(report.waste_windows.len(), 1);
    let waste = &report.waste_windows[0];
    assert!((waste.baseline_kw - 1.8).abs() < 0.05);
    assert_eq!(waste.excess_intervals.len(), 10);
    assert!(waste.excess_intervals.iter().all(|e| is_spike_window(e.timestamp)));
    let spike_excess = 12.0 * (6.0 - waste.baseline_kw) * 0.25;
    assert!(waste.excess_kwh >= spike_excess);
    assert!(waste.excess_kwh - spike_excess < 5.0);

    // Site summary is the only high-priority win
    assert_eq!(report.quick_wins[0].kind, WinKind::SiteSummary);
    assert_eq!(report.quick_wins[0].priority, Priority::High);
    assert!(report.quick_wins[1..].iter().all(|w| w.priority < Priority::High));
    let kinds: Vec<WinKind> = report.quick_wins.iter().map(|w| w.kind).collect();
    assert!(kinds.contains(&WinKind::AfterHoursWaste));
    assert!(kinds.contains(&WinKind::Anomaly));
    assert!(kinds.contains(&WinKind::DemandSpike));

    assert!(report.summary.top_opportunities[0].starts_with("Demand spike reduction"));
}

#[test]
fn test_identical_runs_produce_identical_reports() {
    let input = scenario();
    let config = Config::default();

    let first = analyze_site(&input, &config, None).unwrap();
    let second = analyze_site(&input, &config, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_evening_opening_hours_from_toml() {
    let config = Config::from_toml_str(
        r#"
        [business_hours]
        monday = { start = 7, end = 18 }
        tuesday = { start = 7, end = 18 }
        wednesday = { start = 7, end = 23 }
        thursday = { start = 7, end = 18 }
        friday = { start = 7, end = 18 }
        "#,
    )
    .unwrap();

    let report = analyze_site(&scenario(), &config, None).unwrap();

    assert_eq!(report.spikes.len(), 1);
    assert_eq!(report.spikes[0].context, EventContext::BusinessHours);
    // The spike is now inside business hours, leaving only ripple after hours
    assert!(report.waste_windows.is_empty());
}

#[test]
fn test_report_serializes_issue_type_field() {
    let mut input = scenario();
    input.channels[0].report_readings.clear();

    let report = analyze_site(&input, &Config::default(), None).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["issues"][0]["type"], "no_data");
    assert_eq!(json["issues"][0]["severity"], "critical");
}

#[tokio::test]
async fn test_concurrent_assembly_matches_sequential() {
    let sequential = analyze_site(&scenario(), &Config::default(), None).unwrap();
    let concurrent = analyze_site_concurrent(scenario(), Config::default(), None)
        .await
        .unwrap();

    assert_eq!(sequential, concurrent);
}
