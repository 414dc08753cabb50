//! Telemetry sources
//!
//! A source produces raw samples for the store. The store only talks to the
//! [`TelemetrySource`] trait, so the random [`MockSource`] can be swapped for a
//! sensor- or API-backed implementation without touching consumers.

mod mock;

pub use mock::MockSource;

use crate::error::PulseError;
use crate::types::{MetricKind, SampleWindow, TimeSeriesPoint};
use chrono::{DateTime, Utc};

/// Capability implemented by anything that can feed a telemetry store
pub trait TelemetrySource: Send {
    /// Produce the sample of `kind` observed at `at`
    fn fetch_latest(
        &mut self,
        kind: MetricKind,
        at: DateTime<Utc>,
    ) -> Result<TimeSeriesPoint, PulseError>;

    /// Produce one sample per timestamp of `window`, ascending
    fn fetch_history(
        &mut self,
        kind: MetricKind,
        window: &SampleWindow,
    ) -> Result<Vec<TimeSeriesPoint>, PulseError>;

    /// Replace the values of `points` in place, keeping their timestamps.
    ///
    /// Only synthetic sources can do this meaningfully.
    fn resample(
        &mut self,
        kind: MetricKind,
        _points: &mut [TimeSeriesPoint],
    ) -> Result<(), PulseError> {
        Err(PulseError::Unsupported(format!(
            "resampling {} values",
            kind.as_str()
        )))
    }
}
