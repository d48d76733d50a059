//! Site report assembly
//!
//! Runs every analyzer over each channel of a site, then merges the results
//! into one report with ranked quick wins and a short executive summary.

use crate::analytics::{
    self, analyze_after_hours, analyze_after_hours_with_baseline, detect_anomalies, detect_spikes,
    generate_quick_wins, rank_waste_windows, sort_by_severity, sort_chronologically,
    summarize_sensor_health, Findings, SensorHealthSummary,
};
use crate::core::{
    AnalysisWindow, AnomalyEvent, BaselineSource, Channel, ChannelInput, Config, Error, Impact,
    Issue, QuickWin, Reading, Result, SpikeEvent, WasteWindow,
};
use crate::pricing::{weekly_factor, CostModel};
use crate::stats;
use crate::time::expected_sample_count;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Anomaly count above which the summary calls out unusual consumption
const HEADLINE_MIN_ANOMALIES: usize = 5;

/// Weekly kWh above which waste or anomalies are listed as a risk
const RISK_KWH: f64 = 100.0;

/// Weekly after-hours kWh above which waste is listed as an opportunity
const OPPORTUNITY_KWH: f64 = 50.0;

/// All data for one site and one report period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInput {
    pub organization_id: String,
    pub report_window: AnalysisWindow,
    pub baseline_window: AnalysisWindow,
    pub channels: Vec<ChannelInput>,
}

impl SiteInput {
    pub fn new(organization_id: &str, report_window: AnalysisWindow, baseline_window: AnalysisWindow) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            report_window,
            baseline_window,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelInput) -> Self {
        self.channels.push(channel);
        self
    }
}

/// Results of every analyzer for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAnalysis {
    pub channel: Channel,
    pub issues: Vec<Issue>,
    pub waste: Option<WasteWindow>,
    pub anomalies: Vec<AnomalyEvent>,
    pub spikes: Vec<SpikeEvent>,
    pub completeness_pct: f64,
}

/// Per-channel overview line of a site report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel_id: String,
    pub channel_name: String,
    pub completeness_pct: f64,
    pub issues: usize,
    pub anomalies: usize,
    pub spikes: usize,
    pub excess_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub headlines: Vec<String>,
    pub top_risks: Vec<String>,
    pub top_opportunities: Vec<String>,
    /// After-hours waste plus anomaly excess, per week and per year
    pub potential_savings: Impact,
    pub average_completeness_pct: f64,
    pub total_channels: usize,
    pub channels_with_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    pub organization_id: String,
    pub report_window: AnalysisWindow,
    pub baseline_window: AnalysisWindow,
    pub channels: Vec<ChannelStatus>,
    /// Most severe first
    pub issues: Vec<Issue>,
    /// Largest excess first
    pub waste_windows: Vec<WasteWindow>,
    pub anomalies: Vec<AnomalyEvent>,
    pub spikes: Vec<SpikeEvent>,
    pub quick_wins: Vec<QuickWin>,
    pub sensor_health: SensorHealthSummary,
    pub summary: ReportSummary,
}

/// Analyze a whole site
///
/// Configuration and windows are checked before any analyzer runs. `reference`
/// is the instant staleness is measured from; the report window end is used
/// when it is `None`.
pub fn analyze_site(
    input: &SiteInput,
    config: &Config,
    reference: Option<NaiveDateTime>,
) -> Result<SiteReport> {
    validate_input(input, config)?;
    log::info!(
        "Analyzing {} channel(s) for {} from {} to {}",
        input.channels.len(),
        input.organization_id,
        input.report_window.start,
        input.report_window.end
    );

    let analyses = input
        .channels
        .iter()
        .map(|channel| analyze_channel(channel, &input.report_window, &input.baseline_window, config, reference))
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(
        &input.organization_id,
        input.report_window,
        input.baseline_window,
        analyses,
        config,
    ))
}

/// Analyze a whole site with one blocking task per channel
///
/// Results are joined in input order, so the report equals the one
/// [`analyze_site`] produces for the same input.
pub async fn analyze_site_concurrent(
    input: SiteInput,
    config: Config,
    reference: Option<NaiveDateTime>,
) -> Result<SiteReport> {
    validate_input(&input, &config)?;
    log::info!(
        "Analyzing {} channel(s) for {} concurrently",
        input.channels.len(),
        input.organization_id
    );

    let SiteInput {
        organization_id,
        report_window,
        baseline_window,
        channels,
    } = input;
    let config = Arc::new(config);

    let handles: Vec<_> = channels
        .into_iter()
        .map(|channel| {
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || {
                analyze_channel(&channel, &report_window, &baseline_window, &config, reference)
            })
        })
        .collect();

    let mut analyses = Vec::with_capacity(handles.len());
    for handle in handles {
        let analysis = handle.await.map_err(|e| Error::Task(e.to_string()))??;
        analyses.push(analysis);
    }

    Ok(assemble(&organization_id, report_window, baseline_window, analyses, &config))
}

fn validate_input(input: &SiteInput, config: &Config) -> Result<()> {
    config.validate()?;
    input.report_window.validate()?;
    input.baseline_window.validate()?;

    for channel in &input.channels {
        if channel.resolution_seconds <= 0 {
            return Err(Error::InvalidConfiguration(format!(
                "channel {} has non-positive resolution {}s",
                channel.channel.channel_id, channel.resolution_seconds
            )));
        }
    }
    Ok(())
}

fn within(readings: &[Reading], window: &AnalysisWindow, channel_id: &str) -> Vec<Reading> {
    let inside: Vec<Reading> = readings
        .iter()
        .filter(|r| window.contains(r.timestamp))
        .cloned()
        .collect();
    if inside.len() < readings.len() {
        log::warn!(
            "Dropped {} reading(s) outside {} - {} on {}",
            readings.len() - inside.len(),
            window.start,
            window.end,
            channel_id
        );
    }
    inside
}

/// Run every per-channel analyzer
pub fn analyze_channel(
    input: &ChannelInput,
    report_window: &AnalysisWindow,
    baseline_window: &AnalysisWindow,
    config: &Config,
    reference: Option<NaiveDateTime>,
) -> Result<ChannelAnalysis> {
    let channel = &input.channel;
    let resolution = input.resolution_seconds;
    let report = within(&input.report_readings, report_window, &channel.channel_id);
    let baseline = within(&input.baseline_readings, baseline_window, &channel.channel_id);

    let issues = analytics::analyze_sensor_health(
        channel,
        &report,
        resolution,
        report_window,
        reference,
        &config.sensor_health,
    )?;

    let baseline_source = config.after_hours.baseline_source;
    if baseline.is_empty() {
        let idle_fallback = if baseline_source == BaselineSource::BaselineWindow {
            ", idle level taken from the report window"
        } else {
            ""
        };
        log::warn!(
            "No baseline readings on {}, skipping anomaly and spike detection{}",
            channel.channel_id,
            idle_fallback
        );
    }

    let waste = match baseline_source {
        BaselineSource::BaselineWindow if !baseline.is_empty() => {
            analyze_after_hours_with_baseline(channel, &report, &baseline, resolution, report_window, config)
        }
        _ => analyze_after_hours(channel, &report, resolution, report_window, config),
    };
    let anomalies = detect_anomalies(
        channel,
        &report,
        &baseline,
        resolution,
        &config.business_hours,
        &config.anomaly,
    );
    let spikes = detect_spikes(
        channel,
        &report,
        &baseline,
        resolution,
        &config.business_hours,
        &config.spike,
    );

    let expected = expected_sample_count(report_window.start, report_window.end, resolution)?;
    let actual = analytics::power_points(&analytics::prepare_series(&report)).len() as u64;

    Ok(ChannelAnalysis {
        channel: channel.clone(),
        issues,
        waste,
        anomalies,
        spikes,
        completeness_pct: stats::completeness_pct(actual, expected),
    })
}

fn assemble(
    organization_id: &str,
    report_window: AnalysisWindow,
    baseline_window: AnalysisWindow,
    analyses: Vec<ChannelAnalysis>,
    config: &Config,
) -> SiteReport {
    let cost = CostModel::new(&config.pricing);

    let channels: Vec<ChannelStatus> = analyses
        .iter()
        .map(|a| ChannelStatus {
            channel_id: a.channel.channel_id.clone(),
            channel_name: a.channel.channel_name.clone(),
            completeness_pct: a.completeness_pct,
            issues: a.issues.len(),
            anomalies: a.anomalies.len(),
            spikes: a.spikes.len(),
            excess_kwh: a.waste.as_ref().map(|w| w.excess_kwh).unwrap_or(0.0),
        })
        .collect();
    let completeness: Vec<f64> = analyses.iter().map(|a| a.completeness_pct).collect();

    let mut issues = Vec::new();
    let mut waste_windows = Vec::new();
    let mut anomalies = Vec::new();
    let mut spikes = Vec::new();
    for analysis in analyses {
        issues.extend(analysis.issues);
        waste_windows.extend(analysis.waste);
        anomalies.extend(analysis.anomalies);
        spikes.extend(analysis.spikes);
    }

    sort_by_severity(&mut issues);
    rank_waste_windows(&mut waste_windows);
    sort_chronologically(&mut anomalies);
    sort_chronologically(&mut spikes);

    let findings = Findings {
        issues: &issues,
        waste_windows: &waste_windows,
        anomalies: &anomalies,
        spikes: &spikes,
        window_seconds: report_window.duration_seconds(),
    };
    let mut quick_wins = generate_quick_wins(&findings, &config.quick_wins, &cost);
    quick_wins.truncate(config.quick_wins.max_count);

    let sensor_health = summarize_sensor_health(&issues);
    let summary = summarize(&findings, &sensor_health, &channels, stats::mean(&completeness), &cost);

    log::info!(
        "Report for {}: {} issue(s), {} waste window(s), {} anomalies, {} spikes, {} quick win(s)",
        organization_id,
        issues.len(),
        waste_windows.len(),
        anomalies.len(),
        spikes.len(),
        quick_wins.len()
    );

    SiteReport {
        organization_id: organization_id.to_string(),
        report_window,
        baseline_window,
        channels,
        issues,
        waste_windows,
        anomalies,
        spikes,
        quick_wins,
        sensor_health,
        summary,
    }
}

fn summarize(
    findings: &Findings<'_>,
    sensor_health: &SensorHealthSummary,
    channels: &[ChannelStatus],
    average_completeness_pct: f64,
    cost: &CostModel,
) -> ReportSummary {
    let per_week = weekly_factor(findings.window_seconds);
    let symbol = cost.currency_symbol();

    let waste_kwh = findings.waste_windows.iter().map(|w| w.excess_kwh).sum::<f64>() * per_week;
    let anomaly_kwh = findings.anomalies.iter().map(|e| e.excess_kwh).sum::<f64>() * per_week;
    let serious = sensor_health.critical + sensor_health.high;

    let mut headlines = Vec::new();
    if serious > 0 {
        headlines.push(format!("{} critical data quality issue(s) detected", serious));
    }
    if waste_kwh > 0.0 {
        headlines.push(format!(
            "{}{:.0}/week in after-hours waste identified",
            symbol,
            cost.cost(waste_kwh)
        ));
    }
    if findings.anomalies.len() > HEADLINE_MIN_ANOMALIES {
        headlines.push(format!(
            "{} unusual consumption events detected",
            findings.anomalies.len()
        ));
    }
    if headlines.is_empty() {
        headlines.push("No significant issues detected this week".to_string());
    }

    let mut top_risks = Vec::new();
    if serious > 0 {
        let affected: std::collections::BTreeSet<&str> = findings
            .issues
            .iter()
            .filter(|i| i.severity.is_high())
            .map(|i| i.channel_id.as_str())
            .collect();
        top_risks.push(format!("Missing or unreliable data on {} channel(s)", affected.len()));
    }
    if anomaly_kwh > RISK_KWH {
        top_risks.push(format!("Significant unexpected consumption: {:.0} kWh", anomaly_kwh));
    }
    if waste_kwh > RISK_KWH {
        top_risks.push(format!("High after-hours waste: {:.0} kWh/week", waste_kwh));
    }
    if top_risks.is_empty() {
        top_risks.push("No significant risks identified".to_string());
    }

    let mut top_opportunities = Vec::new();
    if waste_kwh > OPPORTUNITY_KWH {
        top_opportunities.push(format!(
            "After-hours optimization: {}{:.0}/year potential",
            symbol,
            Impact::new(waste_kwh, cost.cost(waste_kwh)).annual_cost
        ));
    }
    if !findings.spikes.is_empty() {
        top_opportunities.push(format!(
            "Demand spike reduction: {} events to investigate",
            findings.spikes.len()
        ));
    }
    if top_opportunities.is_empty() {
        top_opportunities.push("Continue monitoring for optimization opportunities".to_string());
    }

    let savings_kwh = waste_kwh + anomaly_kwh;

    ReportSummary {
        headlines,
        top_risks,
        top_opportunities,
        potential_savings: Impact::new(savings_kwh, cost.cost(savings_kwh)),
        average_completeness_pct,
        total_channels: channels.len(),
        channels_with_issues: channels.iter().filter(|c| c.issues > 0).count(),
    }
}
