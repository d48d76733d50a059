//! Error types for the analytics engine

use thiserror::Error;

/// Engine-wide error type
///
/// Data problems on a single channel never surface here; they become
/// sensor-health issues instead. Only misconfiguration and boundary
/// failures are reported as errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Analysis task failed: {0}")]
    Task(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
