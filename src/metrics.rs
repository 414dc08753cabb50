//! Derived metrics
//!
//! Pure computations over series and snapshots:
//! - Trend label of a single glucose value
//! - Time-in-range percentage
//! - Per-series statistics (count, average, min, max)
//! - Header summary derived from the latest samples

use crate::types::{
    MetricKind, StoreSnapshot, SummaryMetrics, TimeSeriesPoint, TrendLabel,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values strictly above this are reported as rising (mmol/L)
pub const RISING_THRESHOLD: f64 = 8.5;

/// Values strictly below this are reported as falling (mmol/L)
pub const FALLING_THRESHOLD: f64 = 4.0;

/// Classify a glucose value against the fixed thresholds.
///
/// Uses the instantaneous value only. The thresholds themselves are stable.
pub fn derive_trend(value: f64) -> TrendLabel {
    if value > RISING_THRESHOLD {
        TrendLabel::Rising
    } else if value < FALLING_THRESHOLD {
        TrendLabel::Falling
    } else {
        TrendLabel::Stable
    }
}

/// Trend label of a point
pub fn trend_of(point: &TimeSeriesPoint) -> TrendLabel {
    derive_trend(point.value)
}

/// Percentage (0-100) of points with `low <= value <= high`.
///
/// An empty series has no time in range and yields 0.0.
pub fn compute_time_in_range(series: &[TimeSeriesPoint], low: f64, high: f64) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let in_range = series
        .iter()
        .filter(|p| p.value >= low && p.value <= high)
        .count();
    (in_range as f64 / series.len() as f64) * 100.0
}

/// Summary statistics of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl SeriesStats {
    /// Compute statistics; value fields are `None` for an empty series
    pub fn compute(series: &[TimeSeriesPoint]) -> Self {
        let count = series.len();
        let (average, min, max) = if count == 0 {
            (None, None, None)
        } else {
            let sum: f64 = series.iter().map(|p| p.value).sum();
            let min = series.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
            let max = series
                .iter()
                .map(|p| p.value)
                .fold(f64::NEG_INFINITY, f64::max);
            (Some(sum / count as f64), Some(min), Some(max))
        };

        Self {
            count,
            average,
            min,
            max,
            first_timestamp: series.first().map(|p| p.timestamp),
            last_timestamp: series.last().map(|p| p.timestamp),
        }
    }
}

/// Statistics for every series of a snapshot
pub fn snapshot_stats(snapshot: &StoreSnapshot) -> BTreeMap<MetricKind, SeriesStats> {
    snapshot
        .series
        .iter()
        .map(|(kind, points)| (*kind, SeriesStats::compute(points)))
        .collect()
}

/// Build the header summary from the latest sample of each series.
///
/// Missing series contribute 0.0. The predicted value is the first
/// forward-looking point.
pub fn summarize(
    series: &BTreeMap<MetricKind, Vec<TimeSeriesPoint>>,
    now: DateTime<Utc>,
) -> SummaryMetrics {
    let latest = |kind: MetricKind| {
        series
            .get(&kind)
            .and_then(|points| points.last())
            .map(|p| p.value)
            .unwrap_or(0.0)
    };
    let predicted_value = series
        .get(&MetricKind::PredictedGlucose)
        .and_then(|points| points.first())
        .map(|p| p.value)
        .unwrap_or(0.0);

    SummaryMetrics {
        current_value: latest(MetricKind::Glucose),
        predicted_value,
        active_quantity: latest(MetricKind::ActiveInsulin),
        on_board_quantity: latest(MetricKind::Carbs),
        last_update: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn series_of(values: &[f64]) -> Vec<TimeSeriesPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesPoint::new(start + Duration::minutes(5 * i as i64), *v))
            .collect()
    }

    #[test]
    fn test_trend_thresholds() {
        assert_eq!(derive_trend(8.6), TrendLabel::Rising);
        assert_eq!(derive_trend(3.9), TrendLabel::Falling);
        assert_eq!(derive_trend(6.0), TrendLabel::Stable);
    }

    #[test]
    fn test_trend_boundaries_are_stable() {
        assert_eq!(derive_trend(8.5), TrendLabel::Stable);
        assert_eq!(derive_trend(4.0), TrendLabel::Stable);
        assert_eq!(derive_trend(8.500001), TrendLabel::Rising);
        assert_eq!(derive_trend(3.999999), TrendLabel::Falling);
    }

    #[test]
    fn test_trend_of_point() {
        let points = series_of(&[9.0]);
        assert_eq!(trend_of(&points[0]), TrendLabel::Rising);
    }

    #[test]
    fn test_time_in_range_seventy_percent() {
        let points = series_of(&[3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0, 10.5, 12.0, 5.5]);
        let tir = compute_time_in_range(&points, 4.0, 10.0);
        assert!((tir - 70.0).abs() < 1e-9, "got {tir}");
    }

    #[test]
    fn test_time_in_range_empty_is_zero() {
        assert_eq!(compute_time_in_range(&[], 4.0, 10.0), 0.0);
    }

    #[test]
    fn test_time_in_range_bounds() {
        let points = series_of(&[5.0, 6.0]);
        assert_eq!(compute_time_in_range(&points, 4.0, 10.0), 100.0);
        assert_eq!(compute_time_in_range(&points, 7.0, 10.0), 0.0);
    }

    #[test]
    fn test_series_stats() {
        let points = series_of(&[4.0, 6.0, 8.0]);
        let stats = SeriesStats::compute(&points);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, Some(6.0));
        assert_eq!(stats.min, Some(4.0));
        assert_eq!(stats.max, Some(8.0));
        assert_eq!(stats.first_timestamp, Some(points[0].timestamp));
        assert_eq!(stats.last_timestamp, Some(points[2].timestamp));
    }

    #[test]
    fn test_series_stats_empty() {
        let stats = SeriesStats::compute(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.average.is_none());
        assert!(stats.min.is_none());
        assert!(stats.last_timestamp.is_none());
    }

    #[test]
    fn test_summarize_uses_latest_and_first_prediction() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let mut series = BTreeMap::new();
        series.insert(MetricKind::Glucose, series_of(&[5.0, 6.5]));
        series.insert(MetricKind::PredictedGlucose, series_of(&[7.1, 7.3]));
        series.insert(MetricKind::ActiveInsulin, series_of(&[1.2]));
        series.insert(MetricKind::Carbs, series_of(&[10.0, 20.0]));

        let summary = summarize(&series, now);

        assert_eq!(summary.current_value, 6.5);
        assert_eq!(summary.predicted_value, 7.1);
        assert_eq!(summary.active_quantity, 1.2);
        assert_eq!(summary.on_board_quantity, 20.0);
        assert_eq!(summary.last_update, now);
    }

    #[test]
    fn test_summarize_missing_series() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let summary = summarize(&BTreeMap::new(), now);
        assert_eq!(summary.current_value, 0.0);
        assert_eq!(summary.predicted_value, 0.0);
    }
}
