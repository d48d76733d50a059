//! Quick wins
//!
//! Turns the findings of the other analyzers into a ranked list of
//! recommendations with a weekly and annual impact.

use crate::analytics::events::by_channel;
use crate::core::{
    AnomalyEvent, Confidence, Effort, Impact, Issue, IssueKind, Priority, QuickWin,
    QuickWinsConfig, SpikeEvent, WasteWindow, WinKind,
};
use crate::pricing::{weekly_factor, CostModel};
use crate::stats;
use std::collections::BTreeSet;

/// Everything the analyzers found for a site over one report window
#[derive(Debug, Clone, Copy)]
pub struct Findings<'a> {
    pub issues: &'a [Issue],
    pub waste_windows: &'a [WasteWindow],
    pub anomalies: &'a [AnomalyEvent],
    pub spikes: &'a [SpikeEvent],
    /// Length of the report window, used to express impact per week
    pub window_seconds: i64,
}

/// Generate ranked quick wins, at most one per channel per finding kind
///
/// The list is not truncated; callers cap it.
pub fn generate_quick_wins(
    findings: &Findings<'_>,
    config: &QuickWinsConfig,
    cost: &CostModel,
) -> Vec<QuickWin> {
    let per_week = weekly_factor(findings.window_seconds);
    let weekly_impact = |kwh: f64| {
        let weekly_kwh = kwh * per_week;
        Impact::new(weekly_kwh, cost.cost(weekly_kwh))
    };

    let mut wins = Vec::new();

    for waste in findings.waste_windows {
        let impact = weekly_impact(waste.excess_kwh);
        if impact.weekly_kwh < config.min_weekly_impact_kwh {
            continue;
        }
        wins.push(after_hours_win(waste, impact, config));
    }

    let issues_by_channel = stats::group_by(findings.issues, |issue| issue.channel_id.clone());

    for (channel_id, issues) in &issues_by_channel {
        let serious: Vec<&Issue> = issues.iter().copied().filter(|i| i.severity.is_high()).collect();
        if let Some(first) = serious.first() {
            wins.push(sensor_health_win(channel_id, &first.channel_name, &serious));
        }
    }

    for (channel_id, events) in by_channel(findings.anomalies) {
        if events.len() < config.anomaly_min_events {
            continue;
        }
        let excess_kwh: f64 = events.iter().map(|e| e.excess_kwh).sum();
        wins.push(anomaly_win(channel_id, &events, weekly_impact(excess_kwh), config));
    }

    for (channel_id, events) in by_channel(findings.spikes) {
        if events.len() < config.spike_min_events {
            continue;
        }
        let excess_kwh: f64 = events.iter().map(|e| e.total_excess_kwh).sum();
        wins.push(spike_win(channel_id, &events, weekly_impact(excess_kwh), config, cost));
    }

    for (channel_id, issues) in &issues_by_channel {
        let flatlines = issues.iter().filter(|i| i.kind == IssueKind::Flatline).count();
        if flatlines > 0 {
            wins.push(stuck_sensor_win(channel_id, &issues[0].channel_name, flatlines));
        }
    }

    let total_waste_kwh: f64 = findings.waste_windows.iter().map(|w| w.excess_kwh).sum();
    if total_waste_kwh > 0.0 {
        wins.push(site_summary_win(findings.waste_windows.len(), weekly_impact(total_waste_kwh)));
    }

    rank_quick_wins(&mut wins);
    log::debug!("Generated {} quick wins", wins.len());
    wins
}

/// Priority descending, then weekly kWh descending; ties keep input order
pub fn rank_quick_wins(wins: &mut [QuickWin]) {
    wins.sort_by(|a, b| {
        b.priority.cmp(&a.priority).then_with(|| {
            b.impact
                .weekly_kwh
                .partial_cmp(&a.impact.weekly_kwh)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
}

fn recommendations(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn after_hours_win(waste: &WasteWindow, impact: Impact, config: &QuickWinsConfig) -> QuickWin {
    QuickWin {
        kind: WinKind::AfterHoursWaste,
        channel_id: Some(waste.channel_id.clone()),
        title: format!("Reduce overnight base load on {}", waste.channel_name),
        description: format!(
            "{} averages {:.1} kW after hours against an idle level of {:.1} kW; {:.0}% of its after-hours energy is above that level. Equipment is likely running outside its schedule.",
            waste.channel_name, waste.this_week_avg_power_kw, waste.baseline_kw, waste.percent_of_total
        ),
        priority: if impact.weekly_kwh >= config.high_priority_kwh {
            Priority::High
        } else {
            Priority::Medium
        },
        impact,
        recommendations: recommendations(&[
            "Verify equipment schedules match actual occupancy",
            "Check for HVAC systems running outside business hours",
            "Look for computers and servers left on unnecessarily",
            "Consider occupancy sensors or time-based controls",
        ]),
        owner: "Facilities Manager".to_string(),
        effort: Effort::LowToMedium,
        confidence: if waste.after_hours_intervals > 100 {
            Confidence::High
        } else {
            Confidence::Medium
        },
    }
}

fn sensor_health_win(channel_id: &str, channel_name: &str, issues: &[&Issue]) -> QuickWin {
    let kinds: BTreeSet<&str> = issues.iter().map(|i| i.kind.as_str()).collect();
    QuickWin {
        kind: WinKind::SensorHealth,
        channel_id: Some(channel_id.to_string()),
        title: format!("Fix data communication issues on {}", channel_name),
        description: format!(
            "{} has {} high-severity data issue(s) ({}). Missing data hides consumption problems and makes the other findings for this meter unreliable.",
            channel_name,
            issues.len(),
            kinds.into_iter().collect::<Vec<_>>().join(", ")
        ),
        priority: Priority::High,
        impact: Impact::informational("Missing data prevents accurate monitoring and may hide energy waste"),
        recommendations: recommendations(&[
            "Check network connectivity and power to the meter",
            "Verify meter configuration and logging interval",
            "Contact the meter vendor if the issue persists",
        ]),
        owner: "Energy Manager / Facilities".to_string(),
        effort: Effort::Medium,
        confidence: Confidence::High,
    }
}

fn stuck_sensor_win(channel_id: &str, channel_name: &str, flatlines: usize) -> QuickWin {
    QuickWin {
        kind: WinKind::StuckSensor,
        channel_id: Some(channel_id.to_string()),
        title: format!("Check stuck sensor on {}", channel_name),
        description: format!(
            "{} reported a constant value in {} period(s). This usually means a failed or misconfigured sensor.",
            channel_name, flatlines
        ),
        priority: Priority::Low,
        impact: Impact::informational("Stuck sensors provide inaccurate data for decision-making"),
        recommendations: recommendations(&[
            "Inspect the sensor for damage or disconnection",
            "Reset or recalibrate the meter",
            "Replace the sensor if recalibration fails",
        ]),
        owner: "Facilities / Maintenance".to_string(),
        effort: Effort::Low,
        confidence: Confidence::High,
    }
}

fn anomaly_win(
    channel_id: &str,
    events: &[&AnomalyEvent],
    impact: Impact,
    config: &QuickWinsConfig,
) -> QuickWin {
    let channel_name = events.first().map(|e| e.channel_name.as_str()).unwrap_or(channel_id);
    let largest = events.iter().max_by(|a, b| {
        a.excess_kwh
            .partial_cmp(&b.excess_kwh)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let peak = largest
        .map(|e| format!(" The largest peaked at {:.1} kW during {}.", e.peak_power_kw, e.context))
        .unwrap_or_default();

    QuickWin {
        kind: WinKind::Anomaly,
        channel_id: Some(channel_id.to_string()),
        title: format!("Investigate unusual consumption on {}", channel_name),
        description: format!(
            "{} had {} anomalous event(s) using {:.1} kWh above its normal pattern.{}",
            channel_name,
            events.len(),
            impact.weekly_kwh,
            peak
        ),
        priority: if impact.weekly_kwh >= config.anomaly_high_priority_kwh {
            Priority::High
        } else {
            Priority::Medium
        },
        impact,
        recommendations: recommendations(&[
            "Review equipment operation logs for the flagged periods",
            "Check whether equipment was added or settings changed",
            "Consider load shifting if the events fall in peak demand periods",
        ]),
        owner: "Operations / Energy Manager".to_string(),
        effort: Effort::Medium,
        confidence: Confidence::Medium,
    }
}

fn spike_win(
    channel_id: &str,
    events: &[&SpikeEvent],
    impact: Impact,
    config: &QuickWinsConfig,
    cost: &CostModel,
) -> QuickWin {
    let channel_name = events.first().map(|e| e.channel_name.as_str()).unwrap_or(channel_id);
    let peak_kw = events.iter().map(|e| e.peak_power_kw).fold(0.0, f64::max);
    let note = match cost.demand_charge(peak_kw) {
        Some(charge) => format!(
            "Plus potential demand charges of {}{:.2}/month",
            cost.currency_symbol(),
            charge
        ),
        None => "May also affect demand charges if applicable".to_string(),
    };

    QuickWin {
        kind: WinKind::DemandSpike,
        channel_id: Some(channel_id.to_string()),
        title: format!("Reduce demand spikes on {}", channel_name),
        description: format!(
            "{} had {} spike(s) reaching {:.1} kW. This can indicate short-cycling, simultaneous equipment starts or undersized equipment.",
            channel_name,
            events.len(),
            peak_kw
        ),
        priority: if impact.weekly_kwh >= config.high_priority_kwh {
            Priority::High
        } else {
            Priority::Medium
        },
        impact: impact.with_note(note),
        recommendations: recommendations(&[
            "Stagger start times for large equipment",
            "Check for short-cycling HVAC or refrigeration",
            "Consider soft-start controllers for motors",
        ]),
        owner: "Facilities Manager".to_string(),
        effort: Effort::MediumToHigh,
        confidence: Confidence::Medium,
    }
}

fn site_summary_win(channels: usize, impact: Impact) -> QuickWin {
    QuickWin {
        kind: WinKind::SiteSummary,
        channel_id: None,
        title: "Overall after-hours optimization opportunity".to_string(),
        description: format!(
            "Site-wide after-hours consumption is {:.0} kWh/week above idle levels across {} meter(s).",
            impact.weekly_kwh, channels
        ),
        priority: Priority::High,
        impact,
        recommendations: recommendations(&[
            "Conduct an after-hours walk-through",
            "Review and update all equipment schedules",
            "Set up weekly monitoring to track progress",
        ]),
        owner: "Energy Manager / Facilities Director".to_string(),
        effort: Effort::Medium,
        confidence: Confidence::High,
    }
}
