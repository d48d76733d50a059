//! Cost model for turning excess energy into money
//!
//! Reports are weekly, so annual projections default to 52 weeks. Other
//! report lengths are scaled by their share of a 365.25-day year.

use crate::core::PricingConfig;
use crate::time::SECONDS_PER_WEEK;

pub const WEEKS_PER_YEAR: f64 = 52.0;

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Slack allowed when deciding a window is exactly one week
/// (an inclusive Mon 00:00 - Sun 23:59:59 window still counts)
const WEEK_TOLERANCE_SECONDS: i64 = 60;

/// Flat-rate cost model
pub struct CostModel {
    config: PricingConfig,
}

impl CostModel {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn rate_per_kwh(&self) -> f64 {
        self.config.cost_per_kwh
    }

    /// Cost of the given energy in kWh
    pub fn cost(&self, kwh: f64) -> f64 {
        kwh * self.config.cost_per_kwh
    }

    /// Monthly demand charge for a peak, if the tariff has one
    pub fn demand_charge(&self, peak_kw: f64) -> Option<f64> {
        self.config.demand_charge_per_kw.map(|rate| peak_kw * rate)
    }

    pub fn currency_symbol(&self) -> &str {
        &self.config.currency_symbol
    }
}

/// Factor that turns a value for one window into a yearly value
pub fn annualization_factor(window_seconds: i64) -> f64 {
    if window_seconds <= 0 {
        return 0.0;
    }
    if (window_seconds - SECONDS_PER_WEEK).abs() <= WEEK_TOLERANCE_SECONDS {
        return WEEKS_PER_YEAR;
    }
    SECONDS_PER_YEAR / window_seconds as f64
}

/// Factor that turns a value for one window into a per-week value
pub fn weekly_factor(window_seconds: i64) -> f64 {
    if window_seconds <= 0 {
        return 0.0;
    }
    if (window_seconds - SECONDS_PER_WEEK).abs() <= WEEK_TOLERANCE_SECONDS {
        return 1.0;
    }
    SECONDS_PER_WEEK as f64 / window_seconds as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing_config(rate: f64) -> PricingConfig {
        PricingConfig {
            cost_per_kwh: rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_flat_rate_cost() {
        let model = CostModel::new(&pricing_config(0.20));

        assert_eq!(model.rate_per_kwh(), 0.20);
        assert_eq!(model.cost(1.0), 0.20);
        assert_eq!(model.cost(10.0), 2.0);
        assert_eq!(model.currency_symbol(), "$");
    }

    #[test]
    fn test_demand_charge_optional() {
        let model = CostModel::new(&pricing_config(0.12));
        assert_eq!(model.demand_charge(40.0), None);

        let config = PricingConfig {
            demand_charge_per_kw: Some(12.5),
            ..Default::default()
        };
        let model = CostModel::new(&config);
        assert_eq!(model.demand_charge(40.0), Some(500.0));
    }

    #[test]
    fn test_weekly_window_annualizes_by_52() {
        assert_eq!(annualization_factor(SECONDS_PER_WEEK), 52.0);
        assert_eq!(annualization_factor(SECONDS_PER_WEEK - 1), 52.0);
        assert_eq!(weekly_factor(SECONDS_PER_WEEK), 1.0);
    }

    #[test]
    fn test_other_windows_scale_by_year_share() {
        let day = 24 * 3600;
        assert!((annualization_factor(day) - 365.25).abs() < 1e-9);
        assert!((weekly_factor(day) - 7.0).abs() < 1e-9);
        assert!((weekly_factor(2 * SECONDS_PER_WEEK) - 0.5).abs() < 1e-9);
        assert_eq!(annualization_factor(0), 0.0);
    }
}
