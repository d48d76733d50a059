//! Configuration management
//!
//! Every numeric threshold the analyzers use lives here with its default,
//! so a site can be tuned from `config.toml` without code changes.

use crate::core::{Error, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub business_hours: BusinessHoursCalendar,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    pub sensor_health: SensorHealthConfig,
    #[serde(default)]
    pub after_hours: AfterHoursConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub spike: SpikeConfig,
    #[serde(default)]
    pub quick_wins: QuickWinsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            business_hours: BusinessHoursCalendar::default(),
            pricing: PricingConfig::default(),
            baseline: BaselineConfig::default(),
            sensor_health: SensorHealthConfig::default(),
            after_hours: AfterHoursConfig::default(),
            anomaly: AnomalyConfig::default(),
            spike: SpikeConfig::default(),
            quick_wins: QuickWinsConfig::default(),
        }
    }
}

impl Config {
    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            Error::InvalidConfiguration("Could not determine config directory".to_string())
        })?;

        Ok(config_dir.join("energy-brief").join("config.toml"))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Serialization(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from the default path, or fall back to defaults if there is no file
    pub fn load_or_default() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        log::info!("Loading config from {}", path.display());
        Self::load(&path)
    }

    /// Check every option against its valid domain
    pub fn validate(&self) -> Result<()> {
        if self.general.interval_seconds <= 0 {
            return Err(invalid("general.interval_seconds must be positive"));
        }
        self.business_hours.validate()?;
        require_non_negative("pricing.cost_per_kwh", self.pricing.cost_per_kwh)?;
        if let Some(charge) = self.pricing.demand_charge_per_kw {
            require_non_negative("pricing.demand_charge_per_kw", charge)?;
        }
        if self.baseline.periods == 0 {
            return Err(invalid("baseline.periods must be at least 1"));
        }

        let sh = &self.sensor_health;
        require_non_negative("sensor_health.gap_multiplier", sh.gap_multiplier)?;
        require_non_negative("sensor_health.gap_tolerance", sh.gap_tolerance)?;
        require_positive("sensor_health.gap_high_severity_hours", sh.gap_high_severity_hours)?;
        require_positive("sensor_health.stale_hours", sh.stale_hours)?;
        if sh.stale_critical_hours < sh.stale_hours {
            return Err(invalid(
                "sensor_health.stale_critical_hours must not be below stale_hours",
            ));
        }
        require_percent("sensor_health.missing_threshold_pct", sh.missing_threshold_pct)?;
        require_percent(
            "sensor_health.completeness_high_severity_pct",
            sh.completeness_high_severity_pct,
        )?;
        require_positive("sensor_health.flatline_hours", sh.flatline_hours)?;
        require_non_negative("sensor_health.flatline_std_dev_kw", sh.flatline_std_dev_kw)?;

        let ah = &self.after_hours;
        require_percent("after_hours.baseline_percentile", ah.baseline_percentile)?;
        require_non_negative("after_hours.min_power_kw", ah.min_power_kw)?;
        require_non_negative("after_hours.min_excess_kwh", ah.min_excess_kwh)?;

        let an = &self.anomaly;
        require_non_negative("anomaly.iqr_multiplier", an.iqr_multiplier)?;
        if an.min_consecutive_intervals == 0 {
            return Err(invalid("anomaly.min_consecutive_intervals must be at least 1"));
        }
        require_non_negative("anomaly.min_excess_kwh", an.min_excess_kwh)?;
        require_positive("anomaly.max_gap_intervals", an.max_gap_intervals)?;

        let sp = &self.spike;
        require_percent("spike.baseline_percentile", sp.baseline_percentile)?;
        require_positive("spike.multiplier", sp.multiplier)?;
        require_non_negative("spike.submeter_min_kw", sp.submeter_min_kw)?;
        require_non_negative("spike.site_total_min_kw", sp.site_total_min_kw)?;
        if sp.min_duration_intervals == 0 {
            return Err(invalid("spike.min_duration_intervals must be at least 1"));
        }
        require_positive("spike.max_gap_intervals", sp.max_gap_intervals)?;

        let qw = &self.quick_wins;
        require_non_negative("quick_wins.min_weekly_impact_kwh", qw.min_weekly_impact_kwh)?;
        require_non_negative("quick_wins.high_priority_kwh", qw.high_priority_kwh)?;
        require_non_negative(
            "quick_wins.anomaly_high_priority_kwh",
            qw.anomaly_high_priority_kwh,
        )?;

        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfiguration(message.to_string())
}

fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

fn require_percent(name: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(Error::InvalidConfiguration(format!(
            "{} must be within 0-100, got {}",
            name, value
        )));
    }
    Ok(())
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// IANA timezone the readings were normalized to (informational)
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Default sampling resolution in seconds
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: i64,
}

fn default_timezone() -> String { "America/New_York".to_string() }
fn default_interval_seconds() -> i64 { 900 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

/// Opening hours for one weekday, half-open `[start, end)` in whole hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub start: u32,
    pub end: u32,
}

impl DayHours {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        self.start <= hour && hour < self.end
    }
}

/// Business hours per weekday
///
/// A missing day means the whole day is after-hours. When the section is
/// present in a config file only the listed days are open; when it is
/// absent the Mon-Fri 7-18 default applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessHoursCalendar {
    #[serde(default)]
    pub monday: Option<DayHours>,
    #[serde(default)]
    pub tuesday: Option<DayHours>,
    #[serde(default)]
    pub wednesday: Option<DayHours>,
    #[serde(default)]
    pub thursday: Option<DayHours>,
    #[serde(default)]
    pub friday: Option<DayHours>,
    #[serde(default)]
    pub saturday: Option<DayHours>,
    #[serde(default)]
    pub sunday: Option<DayHours>,
}

impl Default for BusinessHoursCalendar {
    fn default() -> Self {
        let weekday = Some(DayHours::new(7, 18));
        Self {
            monday: weekday,
            tuesday: weekday,
            wednesday: weekday,
            thursday: weekday,
            friday: weekday,
            saturday: None,
            sunday: None,
        }
    }
}

impl BusinessHoursCalendar {
    /// A calendar with no business hours at all
    pub fn closed() -> Self {
        Self {
            monday: None,
            tuesday: None,
            wednesday: None,
            thursday: None,
            friday: None,
            saturday: None,
            sunday: None,
        }
    }

    pub fn hours_for(&self, weekday: Weekday) -> Option<DayHours> {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let days = [
            ("monday", self.monday),
            ("tuesday", self.tuesday),
            ("wednesday", self.wednesday),
            ("thursday", self.thursday),
            ("friday", self.friday),
            ("saturday", self.saturday),
            ("sunday", self.sunday),
        ];

        for (name, hours) in days {
            if let Some(hours) = hours {
                if hours.start >= hours.end || hours.end > 24 {
                    return Err(Error::InvalidConfiguration(format!(
                        "business_hours.{}: expected 0 <= start < end <= 24, got {}-{}",
                        name, hours.start, hours.end
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Tariff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat energy rate per kWh
    #[serde(default = "default_cost_per_kwh")]
    pub cost_per_kwh: f64,
    /// Currency code (USD, EUR, GBP, etc.)
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    /// Monthly demand charge per peak kW, if the tariff has one
    #[serde(default)]
    pub demand_charge_per_kw: Option<f64>,
}

fn default_cost_per_kwh() -> f64 { 0.12 }
fn default_currency() -> String { "USD".to_string() }
fn default_currency_symbol() -> String { "$".to_string() }

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cost_per_kwh: default_cost_per_kwh(),
            currency: default_currency(),
            currency_symbol: default_currency_symbol(),
            demand_charge_per_kw: None,
        }
    }
}

/// Historical baseline window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Baseline length as a multiple of the report window length
    #[serde(default = "default_baseline_periods")]
    pub periods: u32,
}

fn default_baseline_periods() -> u32 { 4 }

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            periods: default_baseline_periods(),
        }
    }
}

/// Sensor and communications health thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorHealthConfig {
    /// Minimum missing intervals before a gap is reported
    #[serde(default = "default_gap_multiplier")]
    pub gap_multiplier: f64,
    /// Allowed slack on the nominal interval before a step counts as a gap
    #[serde(default = "default_gap_tolerance")]
    pub gap_tolerance: f64,
    #[serde(default = "default_gap_high_severity_hours")]
    pub gap_high_severity_hours: f64,
    #[serde(default = "default_stale_hours")]
    pub stale_hours: f64,
    #[serde(default = "default_stale_critical_hours")]
    pub stale_critical_hours: f64,
    /// Completeness below `100 - missing_threshold_pct` is reported
    #[serde(default = "default_missing_threshold_pct")]
    pub missing_threshold_pct: f64,
    #[serde(default = "default_completeness_high_severity_pct")]
    pub completeness_high_severity_pct: f64,
    #[serde(default = "default_flatline_hours")]
    pub flatline_hours: f64,
    #[serde(default = "default_flatline_std_dev_kw")]
    pub flatline_std_dev_kw: f64,
}

fn default_gap_multiplier() -> f64 { 2.0 }
fn default_gap_tolerance() -> f64 { 0.1 }
fn default_gap_high_severity_hours() -> f64 { 24.0 }
fn default_stale_hours() -> f64 { 2.0 }
fn default_stale_critical_hours() -> f64 { 24.0 }
fn default_missing_threshold_pct() -> f64 { 10.0 }
fn default_completeness_high_severity_pct() -> f64 { 50.0 }
fn default_flatline_hours() -> f64 { 6.0 }
fn default_flatline_std_dev_kw() -> f64 { 0.01 }

impl Default for SensorHealthConfig {
    fn default() -> Self {
        Self {
            gap_multiplier: default_gap_multiplier(),
            gap_tolerance: default_gap_tolerance(),
            gap_high_severity_hours: default_gap_high_severity_hours(),
            stale_hours: default_stale_hours(),
            stale_critical_hours: default_stale_critical_hours(),
            missing_threshold_pct: default_missing_threshold_pct(),
            completeness_high_severity_pct: default_completeness_high_severity_pct(),
            flatline_hours: default_flatline_hours(),
            flatline_std_dev_kw: default_flatline_std_dev_kw(),
        }
    }
}

/// Which readings the after-hours idle baseline is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    #[default]
    ReportWindow,
    BaselineWindow,
}

/// After-hours waste settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AfterHoursConfig {
    #[serde(default = "default_after_hours_percentile")]
    pub baseline_percentile: f64,
    /// Only power strictly above this level feeds the idle baseline
    #[serde(default)]
    pub min_power_kw: f64,
    /// Channels with less excess are left out of the results
    #[serde(default = "default_min_excess_kwh")]
    pub min_excess_kwh: f64,
    #[serde(default)]
    pub baseline_source: BaselineSource,
    #[serde(default = "default_max_detail_intervals")]
    pub max_detail_intervals: usize,
}

fn default_after_hours_percentile() -> f64 { 5.0 }
fn default_min_excess_kwh() -> f64 { 10.0 }
fn default_max_detail_intervals() -> usize { 10 }

impl Default for AfterHoursConfig {
    fn default() -> Self {
        Self {
            baseline_percentile: default_after_hours_percentile(),
            min_power_kw: 0.0,
            min_excess_kwh: default_min_excess_kwh(),
            baseline_source: BaselineSource::default(),
            max_detail_intervals: default_max_detail_intervals(),
        }
    }
}

/// Hour-of-week IQR anomaly settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Threshold is `q3 + iqr_multiplier * iqr`
    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,
    #[serde(default = "default_min_consecutive_intervals")]
    pub min_consecutive_intervals: usize,
    /// Events with less excess energy are dropped (0 disables the filter)
    #[serde(default)]
    pub min_excess_kwh: f64,
    /// Largest step between flagged readings that still joins one event
    #[serde(default = "default_max_gap_intervals")]
    pub max_gap_intervals: f64,
}

fn default_iqr_multiplier() -> f64 { 3.0 }
fn default_min_consecutive_intervals() -> usize { 3 }
fn default_max_gap_intervals() -> f64 { 1.0 }

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: default_iqr_multiplier(),
            min_consecutive_intervals: default_min_consecutive_intervals(),
            min_excess_kwh: 0.0,
            max_gap_intervals: default_max_gap_intervals(),
        }
    }
}

/// Demand spike settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeConfig {
    #[serde(default = "default_spike_percentile")]
    pub baseline_percentile: f64,
    #[serde(default = "default_spike_multiplier")]
    pub multiplier: f64,
    /// Absolute threshold floor for submeters (kW)
    #[serde(default = "default_submeter_min_kw")]
    pub submeter_min_kw: f64,
    /// Absolute threshold floor for site totals (kW)
    #[serde(default = "default_site_total_min_kw")]
    pub site_total_min_kw: f64,
    #[serde(default = "default_min_duration_intervals")]
    pub min_duration_intervals: usize,
    #[serde(default = "default_max_gap_intervals")]
    pub max_gap_intervals: f64,
}

fn default_spike_percentile() -> f64 { 95.0 }
fn default_spike_multiplier() -> f64 { 1.5 }
fn default_submeter_min_kw() -> f64 { 5.0 }
fn default_site_total_min_kw() -> f64 { 20.0 }
fn default_min_duration_intervals() -> usize { 1 }

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            baseline_percentile: default_spike_percentile(),
            multiplier: default_spike_multiplier(),
            submeter_min_kw: default_submeter_min_kw(),
            site_total_min_kw: default_site_total_min_kw(),
            min_duration_intervals: default_min_duration_intervals(),
            max_gap_intervals: default_max_gap_intervals(),
        }
    }
}

/// Recommendation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickWinsConfig {
    /// Number of wins kept in an assembled report
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// Weekly after-hours excess needed before a waste win is suggested
    #[serde(default = "default_min_weekly_impact_kwh")]
    pub min_weekly_impact_kwh: f64,
    #[serde(default = "default_high_priority_kwh")]
    pub high_priority_kwh: f64,
    #[serde(default = "default_anomaly_high_priority_kwh")]
    pub anomaly_high_priority_kwh: f64,
    #[serde(default = "default_min_events")]
    pub anomaly_min_events: usize,
    #[serde(default = "default_min_events")]
    pub spike_min_events: usize,
}

fn default_max_count() -> usize { 10 }
fn default_min_weekly_impact_kwh() -> f64 { 10.0 }
fn default_high_priority_kwh() -> f64 { 100.0 }
fn default_anomaly_high_priority_kwh() -> f64 { 50.0 }
fn default_min_events() -> usize { 1 }

impl Default for QuickWinsConfig {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            min_weekly_impact_kwh: default_min_weekly_impact_kwh(),
            high_priority_kwh: default_high_priority_kwh(),
            anomaly_high_priority_kwh: default_anomaly_high_priority_kwh(),
            anomaly_min_events: default_min_events(),
            spike_min_events: default_min_events(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.pricing.cost_per_kwh, 0.12);
        assert_eq!(config.sensor_health.gap_multiplier, 2.0);
        assert_eq!(config.sensor_health.missing_threshold_pct, 10.0);
        assert_eq!(config.sensor_health.flatline_hours, 6.0);
        assert_eq!(config.after_hours.baseline_percentile, 5.0);
        assert_eq!(config.after_hours.min_excess_kwh, 10.0);
        assert_eq!(config.anomaly.iqr_multiplier, 3.0);
        assert_eq!(config.anomaly.min_consecutive_intervals, 3);
        assert_eq!(config.spike.baseline_percentile, 95.0);
        assert_eq!(config.spike.multiplier, 1.5);
        assert_eq!(config.spike.submeter_min_kw, 5.0);
        assert_eq!(config.spike.site_total_min_kw, 20.0);
        assert_eq!(config.business_hours.monday, Some(DayHours::new(7, 18)));
        assert_eq!(config.business_hours.saturday, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [pricing]
            cost_per_kwh = 0.2

            [spike]
            multiplier = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.pricing.cost_per_kwh, 0.2);
        assert_eq!(config.pricing.currency, "USD");
        assert_eq!(config.spike.multiplier, 2.0);
        assert_eq!(config.spike.submeter_min_kw, 5.0);
        assert_eq!(config.anomaly.iqr_multiplier, 3.0);
    }

    #[test]
    fn test_business_hours_section_lists_open_days_only() {
        let config = Config::from_toml_str(
            r#"
            [business_hours]
            monday = { start = 8, end = 17 }
            saturday = { start = 9, end = 13 }
            "#,
        )
        .unwrap();

        assert_eq!(config.business_hours.hours_for(Weekday::Mon), Some(DayHours::new(8, 17)));
        assert_eq!(config.business_hours.hours_for(Weekday::Tue), None);
        assert_eq!(config.business_hours.hours_for(Weekday::Sat), Some(DayHours::new(9, 13)));
    }

    #[test]
    fn test_inverted_business_hours_rejected() {
        let mut config = Config::default();
        config.business_hours.tuesday = Some(DayHours::new(18, 7));

        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_negative_multiplier_rejected() {
        let mut config = Config::default();
        config.spike.multiplier = -1.5;
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));

        let mut config = Config::default();
        config.anomaly.iqr_multiplier = -3.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_non_positive_resolution_rejected() {
        let mut config = Config::default();
        config.general.interval_seconds = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_invalid_toml_is_serialization_error() {
        let result = Config::from_toml_str("[pricing\ncost_per_kwh = ");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
