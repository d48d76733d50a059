//! Common types used across the engine

use crate::core::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single interval sample for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Wall-clock time, already resolved to the analysis timezone
    pub timestamp: NaiveDateTime,
    /// Average power over the interval in kW
    #[serde(default)]
    pub power_kw: Option<f64>,
    /// Energy over the interval in kWh
    #[serde(default)]
    pub energy_kwh: Option<f64>,
    #[serde(default)]
    pub voltage_v: Option<f64>,
    #[serde(default)]
    pub current_a: Option<f64>,
    #[serde(default)]
    pub power_factor: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, power_kw: f64) -> Self {
        Self {
            timestamp,
            power_kw: Some(power_kw),
            energy_kwh: None,
            voltage_v: None,
            current_a: None,
            power_factor: None,
            temperature_c: None,
        }
    }

    /// A sample slot that was recorded without a power value
    pub fn missing(timestamp: NaiveDateTime) -> Self {
        Self {
            power_kw: None,
            ..Self::new(timestamp, 0.0)
        }
    }

    pub fn with_energy(mut self, energy_kwh: f64) -> Self {
        self.energy_kwh = Some(energy_kwh);
        self
    }
}

/// Class of a monitored point, selects the absolute spike floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Submeter,
    SiteTotal,
}

/// One monitored point (submeter or equipment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub channel_name: String,
    pub organization_id: String,
    #[serde(default)]
    pub kind: ChannelKind,
}

impl Channel {
    pub fn new(channel_id: &str, channel_name: &str, organization_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            channel_name: channel_name.to_string(),
            organization_id: organization_id.to_string(),
            kind: ChannelKind::Submeter,
        }
    }

    pub fn with_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Interval data handed over by the data source for one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInput {
    pub channel: Channel,
    /// Nominal sampling resolution in seconds (900 for 15-minute data)
    pub resolution_seconds: i64,
    /// Readings inside the report window
    pub report_readings: Vec<Reading>,
    /// Readings inside the baseline window
    #[serde(default)]
    pub baseline_readings: Vec<Reading>,
}

/// Half-open `[start, end)` period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(Error::InvalidWindow(format!(
                "window end {} is not after start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Issue severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn is_high(self) -> bool {
        self >= Severity::High
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NoData,
    Gap,
    Stale,
    Flatline,
    LowCompleteness,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::NoData => "no_data",
            IssueKind::Gap => "gap",
            IssueKind::Stale => "stale",
            IssueKind::Flatline => "flatline",
            IssueKind::LowCompleteness => "low_completeness",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A data-quality finding for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub channel_id: String,
    pub channel_name: String,
    pub description: String,
    /// Start of the affected span, or the detection instant
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Numeric details (missing intervals, hours since last reading, ...)
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// A single after-hours interval above the idle baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcessInterval {
    pub timestamp: NaiveDateTime,
    pub power_kw: f64,
    pub excess_kw: f64,
    pub excess_kwh: f64,
}

/// After-hours waste for one channel over the report window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteWindow {
    pub channel_id: String,
    pub channel_name: String,
    /// Idle after-hours power level
    pub baseline_kw: f64,
    pub total_after_hours_kwh: f64,
    pub excess_kwh: f64,
    pub excess_cost: f64,
    pub annualized_cost: f64,
    /// Share of after-hours energy above the baseline, in percent
    pub percent_of_total: f64,
    pub this_week_avg_power_kw: f64,
    pub max_power_kw: f64,
    pub after_hours_intervals: usize,
    /// Largest excess intervals, biggest first
    pub excess_intervals: Vec<ExcessInterval>,
}

/// Whether an event happened mostly inside business hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventContext {
    BusinessHours,
    AfterHours,
}

impl EventContext {
    pub fn as_str(self) -> &'static str {
        match self {
            EventContext::BusinessHours => "business hours",
            EventContext::AfterHours => "after hours",
        }
    }
}

impl fmt::Display for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run of consecutive intervals above the hour-of-week IQR threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub channel_id: String,
    pub channel_name: String,
    pub start: NaiveDateTime,
    /// Timestamp of the last flagged interval
    pub end: NaiveDateTime,
    pub intervals: usize,
    pub peak_power_kw: f64,
    /// Energy above the bucket medians
    pub excess_kwh: f64,
    pub avg_excess_kw: f64,
    /// Z-score of the peak against its bucket
    pub peak_z_score: f64,
    pub context: EventContext,
}

/// A run of consecutive intervals above the high-percentile spike threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub channel_id: String,
    pub channel_name: String,
    pub start: NaiveDateTime,
    /// Timestamp of the last flagged interval
    pub end: NaiveDateTime,
    /// `end - start`
    pub duration_seconds: i64,
    pub intervals: usize,
    pub peak_power_kw: f64,
    /// Threshold that applied to the peak interval
    pub threshold_kw: f64,
    /// Energy above the bucket high percentiles
    pub total_excess_kwh: f64,
    pub context: EventContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    LowToMedium,
    Medium,
    MediumToHigh,
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Effort::Low => "Low",
            Effort::LowToMedium => "Low to Medium",
            Effort::Medium => "Medium",
            Effort::MediumToHigh => "Medium to High",
        };
        f.write_str(label)
    }
}

/// Which finding a quick win was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinKind {
    AfterHoursWaste,
    SensorHealth,
    StuckSensor,
    Anomaly,
    DemandSpike,
    SiteSummary,
}

/// Weekly and annual impact of acting on a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub weekly_kwh: f64,
    pub weekly_cost: f64,
    pub annual_cost: f64,
    #[serde(default)]
    pub note: Option<String>,
}

impl Impact {
    pub fn new(weekly_kwh: f64, weekly_cost: f64) -> Self {
        Self {
            weekly_kwh,
            weekly_cost,
            annual_cost: weekly_cost * crate::pricing::WEEKS_PER_YEAR,
            note: None,
        }
    }

    /// Impact of a finding that has no direct energy value
    pub fn informational(note: &str) -> Self {
        Self {
            note: Some(note.to_string()),
            ..Self::new(0.0, 0.0)
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.note = Some(note);
        self
    }
}

/// An actionable recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickWin {
    pub kind: WinKind,
    /// Channel the win is about; `None` for site-wide wins
    pub channel_id: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub impact: Impact,
    pub recommendations: Vec<String>,
    pub owner: String,
    pub effort: Effort,
    pub confidence: Confidence,
}
