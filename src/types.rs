//! Core types for the Synheart Pulse store
//!
//! This module defines the data that flows between the telemetry source, the
//! store, and dashboard consumers: metric kinds, time-series points, trend
//! labels, the scalar summary, and published snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric kind identifying one time series in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Glucose,
    PredictedGlucose,
    ActiveInsulin,
    InsulinDelivery,
    Carbs,
}

impl MetricKind {
    /// Every kind the store maintains, in display order
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Glucose,
        MetricKind::PredictedGlucose,
        MetricKind::ActiveInsulin,
        MetricKind::InsulinDelivery,
        MetricKind::Carbs,
    ];

    /// Kinds backed by a historical window ending at "now"
    pub const HISTORICAL: [MetricKind; 4] = [
        MetricKind::Glucose,
        MetricKind::ActiveInsulin,
        MetricKind::InsulinDelivery,
        MetricKind::Carbs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Glucose => "glucose",
            MetricKind::PredictedGlucose => "predicted_glucose",
            MetricKind::ActiveInsulin => "active_insulin",
            MetricKind::InsulinDelivery => "insulin_delivery",
            MetricKind::Carbs => "carbs",
        }
    }

    /// Display unit for values of this kind
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Glucose | MetricKind::PredictedGlucose => "mmol/L",
            MetricKind::ActiveInsulin | MetricKind::InsulinDelivery => "U",
            MetricKind::Carbs => "g",
        }
    }
}

/// A single sample in a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Check that timestamps never decrease along the series
pub fn is_sorted_by_time(points: &[TimeSeriesPoint]) -> bool {
    points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Coarse direction indicator derived from a glucose value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Rising,
    Falling,
    Stable,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Rising => "rising",
            TrendLabel::Falling => "falling",
            TrendLabel::Stable => "stable",
        }
    }

    /// Arrow glyph shown next to the current reading
    pub fn arrow(&self) -> &'static str {
        match self {
            TrendLabel::Rising => "↑",
            TrendLabel::Falling => "↓",
            TrendLabel::Stable => "→",
        }
    }
}

/// Scalar snapshot shown in dashboard headers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Latest glucose reading (mmol/L)
    pub current_value: f64,
    /// Next predicted glucose value (mmol/L)
    pub predicted_value: f64,
    /// Latest active insulin (U)
    pub active_quantity: f64,
    /// Latest carbohydrate quantity on board (g)
    pub on_board_quantity: f64,
    /// When the summary was last produced
    pub last_update: DateTime<Utc>,
}

/// Request for `count` evenly spaced samples starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    pub start: DateTime<Utc>,
    pub interval: Duration,
    pub count: usize,
}

impl SampleWindow {
    /// Window of `count` samples whose last sample lands exactly on `end`.
    ///
    /// `None` when the first sample falls outside the representable date range.
    pub fn ending_at(end: DateTime<Utc>, interval: Duration, count: usize) -> Option<Self> {
        let steps = i32::try_from(count.saturating_sub(1)).ok()?;
        let start = end.checked_sub_signed(interval.checked_mul(steps)?)?;
        Some(Self {
            start,
            interval,
            count,
        })
    }

    /// Window of `count` samples beginning one interval after `now`.
    ///
    /// `None` when the last sample falls outside the representable date range.
    pub fn following(now: DateTime<Utc>, interval: Duration, count: usize) -> Option<Self> {
        let start = now.checked_add_signed(interval)?;
        let steps = i32::try_from(count.saturating_sub(1)).ok()?;
        start.checked_add_signed(interval.checked_mul(steps)?)?;
        Some(Self {
            start,
            interval,
            count,
        })
    }

    /// Timestamps covered by the window, ascending
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        std::iter::successors(Some(self.start), move |t| t.checked_add_signed(self.interval))
            .take(self.count)
    }
}

/// Immutable published state of a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Increases by one with every published mutation
    pub revision: u64,
    pub series: BTreeMap<MetricKind, Vec<TimeSeriesPoint>>,
    pub summary: SummaryMetrics,
}

impl StoreSnapshot {
    /// Points of one series; empty when the kind has never been populated
    pub fn series(&self, kind: MetricKind) -> &[TimeSeriesPoint] {
        self.series.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Latest point of one series
    pub fn latest(&self, kind: MetricKind) -> Option<&TimeSeriesPoint> {
        self.series(kind).last()
    }

    /// True when every series is sorted ascending by timestamp
    pub fn is_sorted(&self) -> bool {
        self.series.values().all(|points| is_sorted_by_time(points))
    }
}

/// Notification sent to subscribers after a snapshot is published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    Refreshed { revision: u64 },
    Shuffled { revision: u64 },
    Reset { revision: u64 },
}

impl StoreEvent {
    pub fn revision(&self) -> u64 {
        match self {
            StoreEvent::Refreshed { revision }
            | StoreEvent::Shuffled { revision }
            | StoreEvent::Reset { revision } => *revision,
        }
    }
}
