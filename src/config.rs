//! Store configuration
//!
//! Controls the historical window, sampling cadence, live capacity, refresh
//! interval, target band and per-metric value ranges. Loaded from JSON or built
//! from defaults; every field has a default so partial files are accepted.

use crate::error::PulseError;
use crate::types::MetricKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of days of history generated on initialization
pub const DEFAULT_WINDOW_DAYS: u32 = 1;

/// Default spacing between historical samples
pub const DEFAULT_SAMPLE_INTERVAL_MINUTES: u32 = 5;

/// Default number of forward-looking prediction points
pub const DEFAULT_PREDICTION_POINTS: usize = 12;

/// Default number of glucose points kept by the live feed
pub const DEFAULT_LIVE_CAPACITY: usize = 100;

/// Default cadence of the live refresh loop
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;

/// Longest history or prediction span a store will generate (ten years)
pub const MAX_SPAN_MINUTES: u64 = 10 * 366 * 24 * 60;

/// Closed value range `[min, max]` for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Band of half-width `spread` around `center`
    pub fn around(center: f64, spread: f64) -> Self {
        Self::new(center - spread, center + spread)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, name: &str) -> Result<(), PulseError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(PulseError::InvalidConfig(format!(
                "{name} range must be finite"
            )));
        }
        if self.min > self.max {
            return Err(PulseError::InvalidConfig(format!(
                "{name} range is inverted: {} > {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Value ranges for the historical metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricRanges {
    /// Glucose (mmol/L)
    pub glucose: MetricRange,
    /// Active insulin (U)
    pub active_insulin: MetricRange,
    /// Delivered insulin per sample (U)
    pub insulin_delivery: MetricRange,
    /// Carbohydrate intake per sample (g)
    pub carbs: MetricRange,
}

impl Default for MetricRanges {
    fn default() -> Self {
        Self {
            glucose: MetricRange::new(4.5, 9.5),
            active_insulin: MetricRange::new(0.0, 3.0),
            insulin_delivery: MetricRange::new(0.0, 1.5),
            carbs: MetricRange::new(0.0, 25.0),
        }
    }
}

/// Configuration for a telemetry store and its mock source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub window_days: u32,
    pub sample_interval_minutes: u32,
    pub prediction_points: usize,
    /// Center of the prediction band (mmol/L)
    pub prediction_center: f64,
    /// Half-width of the prediction band (mmol/L)
    pub prediction_spread: f64,
    /// Glucose points kept by the live feed after each refresh
    pub live_capacity: usize,
    pub refresh_interval_secs: u64,
    /// Lower bound of the time-in-range band (mmol/L)
    pub target_low: f64,
    /// Upper bound of the time-in-range band (mmol/L)
    pub target_high: f64,
    pub ranges: MetricRanges,
    /// Fixed RNG seed; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            sample_interval_minutes: DEFAULT_SAMPLE_INTERVAL_MINUTES,
            prediction_points: DEFAULT_PREDICTION_POINTS,
            prediction_center: 7.0,
            prediction_spread: 0.75,
            live_capacity: DEFAULT_LIVE_CAPACITY,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            target_low: 4.0,
            target_high: 10.0,
            ranges: MetricRanges::default(),
            seed: None,
        }
    }
}

impl StoreConfig {
    /// Config with the given window and cadence, defaults elsewhere
    pub fn with_window(window_days: u32, sample_interval_minutes: u32) -> Self {
        Self {
            window_days,
            sample_interval_minutes,
            ..Default::default()
        }
    }

    /// Same config with a fixed RNG seed
    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of historical samples per series
    pub fn history_len(&self) -> usize {
        if self.sample_interval_minutes == 0 {
            return 0;
        }
        let samples = (u64::from(self.window_days) * 24 * 60)
            / u64::from(self.sample_interval_minutes);
        usize::try_from(samples).unwrap_or(usize::MAX)
    }

    /// Minutes covered by the historical window
    pub fn history_span_minutes(&self) -> u64 {
        u64::from(self.window_days) * 24 * 60
    }

    /// Minutes from now to the last prediction point
    pub fn prediction_span_minutes(&self) -> u64 {
        (self.prediction_points as u64).saturating_mul(u64::from(self.sample_interval_minutes))
    }

    /// Value range for a metric kind
    pub fn range_for(&self, kind: MetricKind) -> MetricRange {
        match kind {
            MetricKind::Glucose => self.ranges.glucose,
            MetricKind::PredictedGlucose => {
                MetricRange::around(self.prediction_center, self.prediction_spread)
            }
            MetricKind::ActiveInsulin => self.ranges.active_insulin,
            MetricKind::InsulinDelivery => self.ranges.insulin_delivery,
            MetricKind::Carbs => self.ranges.carbs,
        }
    }

    /// Reject configurations the store cannot honor
    pub fn validate(&self) -> Result<(), PulseError> {
        if self.sample_interval_minutes == 0 {
            return Err(PulseError::InvalidConfig(
                "sample_interval_minutes must be greater than zero".to_string(),
            ));
        }
        if u64::from(self.sample_interval_minutes) > MAX_SPAN_MINUTES {
            return Err(PulseError::InvalidConfig(format!(
                "sample_interval_minutes exceeds {MAX_SPAN_MINUTES}"
            )));
        }
        if self.history_span_minutes() > MAX_SPAN_MINUTES {
            return Err(PulseError::InvalidConfig(format!(
                "window_days spans more than {MAX_SPAN_MINUTES} minutes"
            )));
        }
        if self.prediction_span_minutes() > MAX_SPAN_MINUTES {
            return Err(PulseError::InvalidConfig(format!(
                "prediction_points x sample_interval_minutes spans more than {MAX_SPAN_MINUTES} minutes"
            )));
        }
        if self.live_capacity == 0 {
            return Err(PulseError::InvalidConfig(
                "live_capacity must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(PulseError::InvalidConfig(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if !self.prediction_spread.is_finite() || self.prediction_spread < 0.0 {
            return Err(PulseError::InvalidConfig(
                "prediction_spread must be a non-negative number".to_string(),
            ));
        }
        MetricRange::new(self.target_low, self.target_high).validate("target")?;
        for kind in MetricKind::ALL {
            self.range_for(kind).validate(kind.as_str())?;
        }
        Ok(())
    }

    /// Parse and validate a config from JSON
    pub fn from_json(json: &str) -> Result<Self, PulseError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to pretty JSON
    pub fn to_json(&self) -> Result<String, PulseError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, PulseError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.live_capacity, 100);
        assert_eq!(config.range_for(MetricKind::Glucose), MetricRange::new(4.5, 9.5));
        assert_eq!(config.range_for(MetricKind::Carbs), MetricRange::new(0.0, 25.0));
    }

    #[test]
    fn test_history_len() {
        assert_eq!(StoreConfig::with_window(1, 5).history_len(), 288);
        assert_eq!(StoreConfig::with_window(7, 15).history_len(), 672);
        assert_eq!(StoreConfig::with_window(0, 5).history_len(), 0);
    }

    #[test]
    fn test_prediction_band_is_narrow() {
        let config = StoreConfig::default();
        let band = config.range_for(MetricKind::PredictedGlucose);
        assert!((band.min - 6.25).abs() < 1e-9);
        assert!((band.max - 7.75).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StoreConfig::from_json(r#"{"window_days": 3, "seed": 42}"#).unwrap();
        assert_eq!(config.window_days, 3);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.sample_interval_minutes, DEFAULT_SAMPLE_INTERVAL_MINUTES);
        assert_eq!(config.ranges, MetricRanges::default());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = StoreConfig::from_json(r#"{"sample_interval_minutes": 0}"#);
        assert!(matches!(result, Err(PulseError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut config = StoreConfig::default();
        config.ranges.carbs = MetricRange::new(30.0, 10.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("carbs"));
    }

    #[test]
    fn test_rejects_oversized_history_window() {
        let config = StoreConfig::with_window(100_000_000, 1_000_000).seeded(1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("window_days"));
    }

    #[test]
    fn test_rejects_oversized_prediction_span() {
        let config = StoreConfig {
            sample_interval_minutes: 60,
            prediction_points: 100_000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("prediction_points"));
    }

    #[test]
    fn test_rejects_huge_interval() {
        let config = StoreConfig {
            sample_interval_minutes: u32::MAX,
            prediction_points: 100_000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sample_interval_minutes"));
    }

    #[test]
    fn test_accepts_longest_window() {
        let config = StoreConfig::with_window(3660, 60);
        assert!(config.validate().is_ok());
        assert_eq!(config.history_len(), 3660 * 24);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = StoreConfig {
            live_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = StoreConfig::with_window(2, 10).seeded(7);
        let json = config.to_json().unwrap();
        assert_eq!(StoreConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        let result = StoreConfig::from_json("not json");
        assert!(matches!(result, Err(PulseError::JsonError(_))));
    }
}
