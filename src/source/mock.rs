//! Random telemetry source
//!
//! Draws every value independently and uniformly from the metric's configured
//! range. Seeded sources are fully deterministic.

use super::TelemetrySource;
use crate::config::{MetricRange, StoreConfig};
use crate::error::PulseError;
use crate::types::{MetricKind, SampleWindow, TimeSeriesPoint};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of synthetic samples for dashboards and demos
pub struct MockSource {
    rng: StdRng,
    config: StoreConfig,
}

impl MockSource {
    /// Create a source using the config's ranges, seeded from `config.seed` if set
    pub fn new(config: StoreConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, config }
    }

    /// Create a deterministic source regardless of `config.seed`
    pub fn with_seed(config: StoreConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Draw one value for `kind`
    pub fn draw(&mut self, kind: MetricKind) -> f64 {
        let range = self.config.range_for(kind);
        self.draw_in(range)
    }

    fn draw_in(&mut self, range: MetricRange) -> f64 {
        self.rng.gen_range(range.min..=range.max)
    }
}

impl TelemetrySource for MockSource {
    fn fetch_latest(
        &mut self,
        kind: MetricKind,
        at: DateTime<Utc>,
    ) -> Result<TimeSeriesPoint, PulseError> {
        Ok(TimeSeriesPoint::new(at, self.draw(kind)))
    }

    fn fetch_history(
        &mut self,
        kind: MetricKind,
        window: &SampleWindow,
    ) -> Result<Vec<TimeSeriesPoint>, PulseError> {
        let range = self.config.range_for(kind);
        let points = window
            .timestamps()
            .map(|timestamp| TimeSeriesPoint::new(timestamp, self.draw_in(range)))
            .collect();
        Ok(points)
    }

    fn resample(
        &mut self,
        kind: MetricKind,
        points: &mut [TimeSeriesPoint],
    ) -> Result<(), PulseError> {
        let range = self.config.range_for(kind);
        for point in points.iter_mut() {
            point.value = self.draw_in(range);
        }
        Ok(())
    }
}
