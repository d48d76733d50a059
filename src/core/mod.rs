//! Core module - Configuration, errors, and the engine's data model

mod config;
mod error;
mod types;

pub use config::{Config, GeneralConfig, BusinessHoursCalendar, DayHours, PricingConfig, BaselineConfig, SensorHealthConfig, AfterHoursConfig, BaselineSource, AnomalyConfig, SpikeConfig, QuickWinsConfig};
pub use error::{Error, Result};
pub use types::{Reading, Channel, ChannelKind, ChannelInput, AnalysisWindow, Severity, IssueKind, Issue, ExcessInterval, WasteWindow, EventContext, AnomalyEvent, SpikeEvent, Priority, Confidence, Effort, WinKind, Impact, QuickWin};
