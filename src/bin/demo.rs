//! Energy Brief - Demo CLI
//!
//! Runs the analytics engine over a synthetic site for last week and prints
//! the brief.

use anyhow::Context;
use chrono::{Datelike, Duration, Local, NaiveDateTime, Timelike};

use energy_brief_lib::core::{
    AnalysisWindow, Channel, ChannelInput, ChannelKind, Config, Reading,
};
use energy_brief_lib::report::{analyze_site_concurrent, SiteInput};
use energy_brief_lib::time::{baseline_window, interval_hours, is_business_hours, last_complete_week};

/// Synthetic load: a business-hours plateau over an idle level, with a ripple
fn synthesize(
    config: &Config,
    window: &AnalysisWindow,
    resolution: i64,
    idle_kw: f64,
    business_kw: f64,
    extra: impl Fn(NaiveDateTime) -> f64,
) -> Vec<Reading> {
    let ripple = [-0.04, -0.01, 0.02, 0.03];
    let count = window.duration_seconds() / resolution;

    (0..count)
        .map(|i| {
            let ts = window.start + Duration::seconds(i * resolution);
            let level = if is_business_hours(ts, &config.business_hours) {
                business_kw
            } else {
                idle_kw
            };
            let power = level + ripple[(i % 4) as usize] + extra(ts);
            Reading::new(ts, power).with_energy(power * interval_hours(resolution))
        })
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("==============================================");
    println!("   Energy Brief - Demo CLI");
    println!("==============================================\n");

    // 1. Configuration
    println!("[1/3] Loading configuration...");
    let config = Config::load_or_default().context("loading configuration")?;
    let resolution = config.general.interval_seconds;
    println!("      Timezone: {}", config.general.timezone);
    println!(
        "      Rate:     {}{:.4}/kWh\n",
        config.pricing.currency_symbol, config.pricing.cost_per_kwh
    );

    // 2. Synthetic site
    println!("[2/3] Synthesizing interval data...");
    let report = last_complete_week(Local::now().naive_local());
    let baseline = baseline_window(&report, config.baseline.periods);
    println!("      Report:   {} -> {}", report.start, report.end);
    println!("      Baseline: {} -> {}\n", baseline.start, baseline.end);

    let wednesday_evening = |ts: NaiveDateTime| {
        if ts.weekday().num_days_from_monday() == 2 && (20..23).contains(&ts.hour()) {
            4.5
        } else {
            0.0
        }
    };
    let rtu_left_on = |ts: NaiveDateTime| if ts.hour() < 5 { 3.0 } else { 0.0 };

    let channels = vec![
        ("main", "Main Service", ChannelKind::SiteTotal, 12.0, 30.0),
        ("rtu-1", "Rooftop Unit 1", ChannelKind::Submeter, 1.8, 6.0),
        ("lights", "Lighting Panel", ChannelKind::Submeter, 0.6, 4.0),
    ];

    let mut site = SiteInput::new("demo-org", report, baseline);
    for (id, name, kind, idle, busy) in channels {
        let report_readings = match id {
            "rtu-1" => synthesize(&config, &report, resolution, idle, busy, rtu_left_on),
            "lights" => synthesize(&config, &report, resolution, idle, busy, wednesday_evening),
            _ => synthesize(&config, &report, resolution, idle, busy, |_| 0.0),
        };
        site = site.with_channel(ChannelInput {
            channel: Channel::new(id, name, "demo-org").with_kind(kind),
            resolution_seconds: resolution,
            baseline_readings: synthesize(&config, &baseline, resolution, idle, busy, |_| 0.0),
            report_readings,
        });
    }

    // 3. Analysis
    println!("[3/3] Running analytics...\n");
    let brief = analyze_site_concurrent(site, config.clone(), None).await?;

    println!("----------------------------------------------------------");
    println!("  Channel            | Complete | Issues | Anom. | Excess");
    println!("                     |   (%)    |        |       | (kWh)");
    println!("----------------------------------------------------------");
    for channel in &brief.channels {
        println!(
            "  {:<18} | {:>8.1} | {:>6} | {:>5} | {:>7.1}",
            channel.channel_name,
            channel.completeness_pct,
            channel.issues,
            channel.anomalies,
            channel.excess_kwh
        );
    }
    println!("----------------------------------------------------------\n");

    println!("=== Headlines ===\n");
    for headline in &brief.summary.headlines {
        println!("  * {}", headline);
    }
    println!("\n=== Top Risks ===\n");
    for risk in &brief.summary.top_risks {
        println!("  * {}", risk);
    }
    println!("\n=== Top Opportunities ===\n");
    for opportunity in &brief.summary.top_opportunities {
        println!("  * {}", opportunity);
    }

    let savings = &brief.summary.potential_savings;
    println!("\n  Potential savings:");
    println!("    Weekly: {:.1} kWh / {}{:.2}", savings.weekly_kwh, config.pricing.currency_symbol, savings.weekly_cost);
    println!("    Annual: {}{:.2}", config.pricing.currency_symbol, savings.annual_cost);

    println!("\n=== Quick Wins (JSON) ===\n");
    println!("{}", serde_json::to_string_pretty(&brief.quick_wins)?);

    Ok(())
}
