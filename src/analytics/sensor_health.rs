//! Sensor and communications health
//!
//! Detects data quality issues on one channel:
//! - Missing data gaps between consecutive readings
//! - Stale meters (no recent data)
//! - Flatlined sensors (stuck at a constant non-zero value)
//! - Low data completeness over the report window

use crate::analytics::events::group_consecutive;
use crate::analytics::{power_points, prepare_series};
use crate::core::{
    AnalysisWindow, Channel, Issue, IssueKind, Reading, Result, SensorHealthConfig, Severity,
};
use crate::stats;
use crate::time::expected_sample_count;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Analyze one channel's report-window readings
///
/// `reference` is the "now" used for staleness; the window end is used
/// when none is given. A channel without readings yields a single critical
/// no-data issue and the remaining checks are skipped.
pub fn analyze_sensor_health(
    channel: &Channel,
    readings: &[Reading],
    resolution_seconds: i64,
    window: &AnalysisWindow,
    reference: Option<NaiveDateTime>,
    config: &SensorHealthConfig,
) -> Result<Vec<Issue>> {
    let expected = expected_sample_count(window.start, window.end, resolution_seconds)?;
    let series = prepare_series(readings);

    if series.is_empty() {
        log::warn!("Channel {} has no readings in the report window", channel.channel_id);
        return Ok(vec![no_data_issue(channel, window, expected)]);
    }

    let mut issues = Vec::new();
    issues.extend(detect_gaps(channel, &series, resolution_seconds, config));
    issues.extend(detect_stale(channel, &series, reference.unwrap_or(window.end), config));
    issues.extend(detect_flatlines(channel, &series, resolution_seconds, config));
    issues.extend(check_completeness(channel, &series, window, expected, config));

    log::debug!(
        "Sensor health for {}: {} readings, {} issue(s)",
        channel.channel_id,
        series.len(),
        issues.len()
    );
    Ok(issues)
}

fn issue(channel: &Channel, kind: IssueKind, severity: Severity, description: String) -> Issue {
    Issue {
        kind,
        severity,
        channel_id: channel.channel_id.clone(),
        channel_name: channel.channel_name.clone(),
        description,
        start: None,
        end: None,
        metrics: BTreeMap::new(),
    }
}

fn no_data_issue(channel: &Channel, window: &AnalysisWindow, expected: u64) -> Issue {
    let mut no_data = issue(
        channel,
        IssueKind::NoData,
        Severity::Critical,
        format!("No data received for {} during the report period", channel.channel_name),
    );
    no_data.start = Some(window.start);
    no_data.end = Some(window.end);
    no_data.metrics.insert("expected_count".to_string(), expected as f64);
    no_data
}

fn detect_gaps(
    channel: &Channel,
    series: &[Reading],
    resolution_seconds: i64,
    config: &SensorHealthConfig,
) -> Vec<Issue> {
    let timestamps: Vec<NaiveDateTime> = series.iter().map(|r| r.timestamp).collect();
    let high_severity_seconds = config.gap_high_severity_hours * 3600.0;

    stats::find_gaps(&timestamps, resolution_seconds, config.gap_tolerance)
        .into_iter()
        .filter(|gap| gap.missing_intervals as f64 >= config.gap_multiplier)
        .map(|gap| {
            let hours = gap.actual_interval_seconds as f64 / 3600.0;
            let severity = if gap.actual_interval_seconds as f64 >= high_severity_seconds {
                Severity::High
            } else {
                Severity::Medium
            };

            let mut gap_issue = issue(
                channel,
                IssueKind::Gap,
                severity,
                format!("Missing {} intervals ({:.1}h gap)", gap.missing_intervals, hours),
            );
            gap_issue.start = Some(gap.start);
            gap_issue.end = Some(gap.end);
            gap_issue
                .metrics
                .insert("missing_intervals".to_string(), gap.missing_intervals as f64);
            gap_issue.metrics.insert("gap_hours".to_string(), hours);
            gap_issue
        })
        .collect()
}

fn detect_stale(
    channel: &Channel,
    series: &[Reading],
    now: NaiveDateTime,
    config: &SensorHealthConfig,
) -> Option<Issue> {
    let last = series.last()?.timestamp;
    let hours_since = (now - last).num_seconds() as f64 / 3600.0;

    if hours_since <= config.stale_hours {
        return None;
    }

    let severity = if hours_since > config.stale_critical_hours {
        Severity::High
    } else {
        Severity::Medium
    };

    let mut stale = issue(
        channel,
        IssueKind::Stale,
        severity,
        format!(
            "No data for {:.1} hours (last: {})",
            hours_since,
            last.format("%Y-%m-%d %H:%M:%S")
        ),
    );
    stale.start = Some(last);
    stale.end = Some(now);
    stale.metrics.insert("hours_since_last_reading".to_string(), hours_since);
    Some(stale)
}

/// One issue per contiguous span of low-spread rolling windows
///
/// Windows never reach across a data gap: readings are first split into
/// runs at the same tolerance the gap check uses.
fn detect_flatlines(
    channel: &Channel,
    series: &[Reading],
    resolution_seconds: i64,
    config: &SensorHealthConfig,
) -> Vec<Issue> {
    // A single sample has no spread to judge
    let window_size = ((config.flatline_hours * 3600.0) / resolution_seconds as f64).ceil() as usize;
    let window_size = window_size.max(2);
    let max_step = resolution_seconds as f64 * (1.0 + config.gap_tolerance);

    group_consecutive(power_points(series), |(ts, _)| *ts, max_step)
        .into_iter()
        .flat_map(|run| flatline_spans(channel, &run, window_size, config))
        .collect()
}

fn flatline_spans(
    channel: &Channel,
    points: &[(NaiveDateTime, f64)],
    window_size: usize,
    config: &SensorHealthConfig,
) -> Vec<Issue> {
    let values: Vec<f64> = points.iter().map(|(_, p)| *p).collect();

    let flagged: Vec<stats::RollingStats> = stats::rolling_stats(&values, window_size)
        .into_iter()
        .filter(|w| w.std_dev < config.flatline_std_dev_kw && w.mean != 0.0)
        .collect();

    let mut spans: Vec<Vec<stats::RollingStats>> = Vec::new();
    for window in flagged {
        match spans.last_mut() {
            Some(span) if span.last().map(|w| w.index + 1) == Some(window.index) => span.push(window),
            _ => spans.push(vec![window]),
        }
    }

    spans
        .into_iter()
        .map(|span| {
            let first_index = span[0].index + 1 - window_size;
            let last_index = span[span.len() - 1].index;
            let start = points[first_index].0;
            let end = points[last_index].0;
            let hours = (end - start).num_seconds() as f64 / 3600.0;
            let mean_kw = stats::mean(&values[first_index..=last_index]);

            let mut flatline = issue(
                channel,
                IssueKind::Flatline,
                Severity::Medium,
                format!(
                    "Flatlined at {:.2} kW for {:.1} hours (possible stuck sensor)",
                    mean_kw, hours
                ),
            );
            flatline.start = Some(start);
            flatline.end = Some(end);
            flatline.metrics.insert("mean_power_kw".to_string(), mean_kw);
            flatline.metrics.insert("duration_hours".to_string(), hours);
            flatline
                .metrics
                .insert("max_std_dev_kw".to_string(), span.iter().map(|w| w.std_dev).fold(0.0, f64::max));
            flatline
        })
        .collect()
}

fn check_completeness(
    channel: &Channel,
    series: &[Reading],
    window: &AnalysisWindow,
    expected: u64,
    config: &SensorHealthConfig,
) -> Option<Issue> {
    // Window shorter than one interval
    if expected == 0 {
        return None;
    }

    let actual = series
        .iter()
        .filter(|r| window.contains(r.timestamp) && r.power_kw.is_some())
        .count() as u64;
    let completeness = stats::completeness_pct(actual, expected);

    if completeness >= 100.0 - config.missing_threshold_pct {
        return None;
    }

    let missing = expected.saturating_sub(actual);
    let severity = if completeness < config.completeness_high_severity_pct {
        Severity::High
    } else {
        Severity::Medium
    };

    let mut low = issue(
        channel,
        IssueKind::LowCompleteness,
        severity,
        format!(
            "Only {:.1}% data completeness (missing {} intervals)",
            completeness, missing
        ),
    );
    low.start = Some(window.start);
    low.end = Some(window.end);
    low.metrics.insert("completeness_pct".to_string(), completeness);
    low.metrics.insert("missing_count".to_string(), missing as f64);
    low.metrics.insert("expected_count".to_string(), expected as f64);
    Some(low)
}

/// Sort issues most severe first; equal severities keep their order
pub fn sort_by_severity(issues: &mut [Issue]) {
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// Issue counts for one issue type across a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueTypeSummary {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub count: usize,
    pub affected_channels: usize,
    pub description: String,
}

/// Site-wide sensor health overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorHealthSummary {
    pub total_issues: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub by_type: Vec<IssueTypeSummary>,
}

pub fn summarize_sensor_health(issues: &[Issue]) -> SensorHealthSummary {
    let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();

    let mut grouped: BTreeMap<IssueKind, (usize, BTreeSet<&str>)> = BTreeMap::new();
    for issue in issues {
        let entry = grouped.entry(issue.kind).or_default();
        entry.0 += 1;
        entry.1.insert(issue.channel_name.as_str());
    }

    let by_type = grouped
        .into_iter()
        .map(|(kind, (count, channels))| {
            let listed: Vec<&str> = channels.iter().take(3).copied().collect();
            let more = if channels.len() > 3 {
                format!(" and {} more", channels.len() - 3)
            } else {
                String::new()
            };
            IssueTypeSummary {
                kind,
                count,
                affected_channels: channels.len(),
                description: format!(
                    "{} {} issue(s) affecting {} channel(s): {}{}",
                    count,
                    kind,
                    channels.len(),
                    listed.join(", "),
                    more
                ),
            }
        })
        .collect();

    SensorHealthSummary {
        total_issues: issues.len(),
        critical: count(Severity::Critical),
        high: count(Severity::High),
        medium: count(Severity::Medium),
        low: count(Severity::Low),
        by_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    const RESOLUTION: i64 = 900;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn day_window() -> AnalysisWindow {
        AnalysisWindow::new(start(), start() + Duration::days(1)).unwrap()
    }

    fn channel() -> Channel {
        Channel::new("ch-1", "Chiller 1", "site-1")
    }

    /// 96 readings over one day, alternating load so nothing looks flat
    fn healthy_day() -> Vec<Reading> {
        (0..96)
            .map(|i| Reading::new(start() + Duration::seconds(i * RESOLUTION), 2.0 + (i % 2) as f64))
            .collect()
    }

    fn analyze(readings: &[Reading]) -> Vec<Issue> {
        analyze_sensor_health(
            &channel(),
            readings,
            RESOLUTION,
            &day_window(),
            None,
            &SensorHealthConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_healthy_channel_has_no_issues() {
        assert!(analyze(&healthy_day()).is_empty());
    }

    #[test]
    fn test_no_data_short_circuits() {
        let issues = analyze(&[]);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::NoData);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].metrics["expected_count"], 96.0);
    }

    #[test]
    fn test_gap_reported_with_missing_intervals() {
        let mut readings = healthy_day();
        // Drop 04:00-05:45 (8 readings)
        readings.retain(|r| {
            let offset = (r.timestamp - start()).num_seconds() / RESOLUTION;
            !(16..24).contains(&offset)
        });

        let issues = analyze(&readings);
        let gaps: Vec<&Issue> = issues.iter().filter(|i| i.kind == IssueKind::Gap).collect();

        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].severity, Severity::Medium);
        assert_eq!(gaps[0].metrics["missing_intervals"], 8.0);
        assert_eq!(gaps[0].start, Some(start() + Duration::minutes(225)));
        // 88 of 96 is 91.7%, still complete enough
        assert!(!issues.iter().any(|i| i.kind == IssueKind::LowCompleteness));
    }

    #[test]
    fn test_single_missing_interval_below_gap_multiplier() {
        let mut readings = healthy_day();
        readings.remove(10);

        assert!(analyze(&readings).is_empty());
    }

    #[test]
    fn test_day_long_gap_is_high_severity() {
        let window = AnalysisWindow::new(start(), start() + Duration::days(3)).unwrap();
        let readings = vec![
            Reading::new(start(), 2.0),
            Reading::new(start() + Duration::hours(30), 3.0),
            Reading::new(start() + Duration::hours(30) + Duration::minutes(15), 2.0),
        ];

        let issues = analyze_sensor_health(
            &channel(),
            &readings,
            RESOLUTION,
            &window,
            Some(start() + Duration::hours(31)),
            &SensorHealthConfig::default(),
        )
        .unwrap();

        let gap = issues.iter().find(|i| i.kind == IssueKind::Gap).unwrap();
        assert_eq!(gap.severity, Severity::High);
    }

    #[test]
    fn test_gap_of_exactly_a_day_is_high_severity() {
        let window = AnalysisWindow::new(start(), start() + Duration::days(3)).unwrap();
        let severity_after = |hole: Duration| {
            let readings = vec![
                Reading::new(start(), 2.0),
                Reading::new(start() + hole, 3.0),
                Reading::new(start() + hole + Duration::minutes(15), 2.0),
            ];
            let issues = analyze_sensor_health(
                &channel(),
                &readings,
                RESOLUTION,
                &window,
                Some(start() + hole + Duration::hours(1)),
                &SensorHealthConfig::default(),
            )
            .unwrap();
            issues.iter().find(|i| i.kind == IssueKind::Gap).unwrap().clone()
        };

        let day = severity_after(Duration::hours(24));
        assert_eq!(day.severity, Severity::High);
        assert_eq!(day.metrics["missing_intervals"], 95.0);

        let just_under = severity_after(Duration::hours(24) - Duration::minutes(15));
        assert_eq!(just_under.severity, Severity::Medium);
    }

    #[test]
    fn test_stale_escalates_after_a_day() {
        let window = AnalysisWindow::new(start(), start() + Duration::days(3)).unwrap();
        let readings: Vec<Reading> = healthy_day();

        let config = SensorHealthConfig::default();

        // 3h after the last reading: medium
        let reference = start() + Duration::hours(24 + 3) - Duration::minutes(15);
        let issues =
            analyze_sensor_health(&channel(), &readings, RESOLUTION, &window, Some(reference), &config).unwrap();
        let stale = issues.iter().find(|i| i.kind == IssueKind::Stale).unwrap();
        assert_eq!(stale.severity, Severity::Medium);
        assert!((stale.metrics["hours_since_last_reading"] - 3.0).abs() < 1e-9);

        // Window end is two days after the last reading: high
        let issues = analyze_sensor_health(&channel(), &readings, RESOLUTION, &window, None, &config).unwrap();
        let stale = issues.iter().find(|i| i.kind == IssueKind::Stale).unwrap();
        assert_eq!(stale.severity, Severity::High);
    }

    #[test]
    fn test_flatline_reported_once_per_span() {
        // 12h stuck at 4.2 kW, then varying load
        let readings: Vec<Reading> = (0..96)
            .map(|i| {
                let power = if i < 48 { 4.2 } else { 2.0 + (i % 2) as f64 };
                Reading::new(start() + Duration::seconds(i * RESOLUTION), power)
            })
            .collect();

        let issues = analyze(&readings);
        let flatlines: Vec<&Issue> = issues.iter().filter(|i| i.kind == IssueKind::Flatline).collect();

        assert_eq!(flatlines.len(), 1);
        assert_eq!(flatlines[0].start, Some(start()));
        assert_eq!(flatlines[0].end, Some(start() + Duration::seconds(47 * RESOLUTION)));
        assert!((flatlines[0].metrics["mean_power_kw"] - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_flatline_does_not_span_data_gap() {
        // Two 3h stretches at 4.2 kW either side of a two-day outage
        let window = AnalysisWindow::new(start(), start() + Duration::days(3)).unwrap();
        let resume = start() + Duration::days(2);
        let readings: Vec<Reading> = (0..12)
            .map(|i| Reading::new(start() + Duration::seconds(i * RESOLUTION), 4.2))
            .chain((0..12).map(|i| Reading::new(resume + Duration::seconds(i * RESOLUTION), 4.2)))
            .collect();

        let issues = analyze_sensor_health(
            &channel(),
            &readings,
            RESOLUTION,
            &window,
            Some(resume + Duration::hours(3)),
            &SensorHealthConfig::default(),
        )
        .unwrap();

        assert!(issues.iter().any(|i| i.kind == IssueKind::Gap));
        assert!(!issues.iter().any(|i| i.kind == IssueKind::Flatline));
    }

    #[test]
    fn test_zero_power_is_not_a_flatline() {
        let readings: Vec<Reading> = (0..96)
            .map(|i| Reading::new(start() + Duration::seconds(i * RESOLUTION), 0.0))
            .collect();

        assert!(!analyze(&readings).iter().any(|i| i.kind == IssueKind::Flatline));
    }

    #[test]
    fn test_low_completeness_counts_null_power() {
        let readings: Vec<Reading> = healthy_day()
            .into_iter()
            .enumerate()
            .map(|(i, r)| if i % 3 == 0 { Reading::missing(r.timestamp) } else { r })
            .collect();

        let issues = analyze(&readings);
        let low = issues
            .iter()
            .find(|i| i.kind == IssueKind::LowCompleteness)
            .unwrap();

        assert_eq!(low.severity, Severity::Medium);
        assert_eq!(low.metrics["missing_count"], 32.0);
    }

    #[test]
    fn test_window_shorter_than_one_interval_skips_completeness() {
        let window = AnalysisWindow::new(start(), start() + Duration::minutes(10)).unwrap();
        let readings = vec![Reading::new(start(), 2.0)];

        let issues = analyze_sensor_health(
            &channel(),
            &readings,
            RESOLUTION,
            &window,
            None,
            &SensorHealthConfig::default(),
        )
        .unwrap();

        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_unordered_duplicated_input_matches_sorted() {
        let mut sorted = healthy_day();
        sorted.retain(|r| {
            let offset = (r.timestamp - start()).num_seconds() / RESOLUTION;
            !(16..24).contains(&offset)
        });

        // Reversed, with an earlier copy of one reading that the later one replaces
        let mut shuffled: Vec<Reading> = sorted.iter().rev().cloned().collect();
        shuffled.insert(0, Reading::new(sorted[5].timestamp, 99.0));
        shuffled.swap(10, 40);

        let expected = analyze(&sorted);
        assert_eq!(expected.len(), 1);
        assert_eq!(analyze(&shuffled), expected);
    }

    #[test]
    fn test_invalid_resolution_is_an_error() {
        let result = analyze_sensor_health(
            &channel(),
            &healthy_day(),
            0,
            &day_window(),
            None,
            &SensorHealthConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_groups_by_type() {
        let mut issues = analyze(&[]);
        let other = Channel::new("ch-2", "Boiler", "site-1");
        issues.push(issue(&other, IssueKind::Gap, Severity::Medium, "gap".to_string()));
        issues.push(issue(&other, IssueKind::Gap, Severity::High, "gap".to_string()));

        sort_by_severity(&mut issues);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[1].severity, Severity::High);

        let summary = summarize_sensor_health(&issues);
        assert_eq!(summary.total_issues, 3);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 1);

        let gaps = summary.by_type.iter().find(|t| t.kind == IssueKind::Gap).unwrap();
        assert_eq!(gaps.count, 2);
        assert_eq!(gaps.affected_channels, 1);
        assert_eq!(gaps.description, "2 gap issue(s) affecting 1 channel(s): Boiler");
    }
}
