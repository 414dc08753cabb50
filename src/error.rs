//! Error types for Synheart Pulse

use thiserror::Error;

/// Errors that can occur while configuring or driving a telemetry store
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation not supported by this source: {0}")]
    Unsupported(String),

    #[error("Telemetry source error: {0}")]
    Source(String),

    #[error("Refresh task error: {0}")]
    Scheduler(String),
}
