//! Energy Brief library
//!
//! Analytics engine behind the weekly energy exceptions and opportunities
//! brief: sensor health, after-hours waste, anomalies, demand spikes and
//! the quick wins derived from them.

pub mod analytics;
pub mod core;
pub mod pricing;
pub mod report;
pub mod stats;
pub mod time;
