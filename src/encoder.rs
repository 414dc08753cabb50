//! Dashboard encoding
//!
//! This module turns a published snapshot into the payload a dashboard header
//! and its charts consume: summary, trend, time-in-range and per-series stats.

use crate::config::StoreConfig;
use crate::error::PulseError;
use crate::metrics::{compute_time_in_range, derive_trend, snapshot_stats, SeriesStats};
use crate::types::{MetricKind, StoreSnapshot, SummaryMetrics, TrendLabel};
use crate::{PRODUCER_NAME, PULSE_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Producer metadata attached to every payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Target band used for time-in-range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetBand {
    pub low: f64,
    pub high: f64,
    pub unit: String,
}

/// Everything a dashboard needs to render one refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPayload {
    pub producer: DashboardProducer,
    pub generated_at_utc: String,
    pub revision: u64,
    pub summary: SummaryMetrics,
    /// Trend of the current glucose value; absent with no glucose data
    pub trend: Option<TrendLabel>,
    pub trend_arrow: Option<String>,
    pub target: TargetBand,
    pub time_in_range_pct: f64,
    pub series: BTreeMap<MetricKind, SeriesStats>,
}

/// Encoder for dashboard payloads
pub struct DashboardEncoder {
    instance_id: String,
    target_low: f64,
    target_high: f64,
}

impl DashboardEncoder {
    /// Create an encoder with a unique instance ID and the config's target band
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_instance_id(config, Uuid::new_v4().to_string())
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(config: &StoreConfig, instance_id: String) -> Self {
        Self {
            instance_id,
            target_low: config.target_low,
            target_high: config.target_high,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a snapshot into a dashboard payload
    pub fn encode(&self, snapshot: &StoreSnapshot) -> DashboardPayload {
        let glucose = snapshot.series(MetricKind::Glucose);
        let trend = glucose.last().map(|p| derive_trend(p.value));

        DashboardPayload {
            producer: DashboardProducer {
                name: PRODUCER_NAME.to_string(),
                version: PULSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at_utc: Utc::now().to_rfc3339(),
            revision: snapshot.revision,
            summary: snapshot.summary.clone(),
            trend,
            trend_arrow: trend.map(|t| t.arrow().to_string()),
            target: TargetBand {
                low: self.target_low,
                high: self.target_high,
                unit: MetricKind::Glucose.unit().to_string(),
            },
            time_in_range_pct: compute_time_in_range(glucose, self.target_low, self.target_high),
            series: snapshot_stats(snapshot),
        }
    }

    /// Encode to a compact JSON string
    pub fn encode_to_json(&self, snapshot: &StoreSnapshot) -> Result<String, PulseError> {
        let payload = self.encode(snapshot);
        serde_json::to_string(&payload).map_err(PulseError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeSeriesPoint;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn snapshot_with(glucose: &[f64]) -> StoreSnapshot {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let points: Vec<_> = glucose
            .iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesPoint::new(start + Duration::minutes(5 * i as i64), *v))
            .collect();
        let mut series = BTreeMap::new();
        series.insert(MetricKind::Glucose, points);
        series.insert(MetricKind::Carbs, Vec::new());

        StoreSnapshot {
            revision: 4,
            summary: crate::metrics::summarize(&series, start),
            series,
        }
    }

    #[test]
    fn test_encode_payload() {
        let encoder = DashboardEncoder::with_instance_id(&StoreConfig::default(), "abc".into());
        let payload = encoder.encode(&snapshot_with(&[3.0, 5.0, 7.0, 9.0]));

        assert_eq!(payload.producer.name, "synheart-pulse");
        assert_eq!(payload.producer.instance_id, "abc");
        assert_eq!(payload.revision, 4);
        assert_eq!(payload.trend, Some(TrendLabel::Rising));
        assert_eq!(payload.trend_arrow.as_deref(), Some("↑"));
        assert!((payload.time_in_range_pct - 75.0).abs() < 1e-9);
        assert_eq!(payload.series[&MetricKind::Glucose].count, 4);
        assert_eq!(payload.series[&MetricKind::Carbs].count, 0);
    }

    #[test]
    fn test_encode_without_glucose() {
        let encoder = DashboardEncoder::new(&StoreConfig::default());
        let payload = encoder.encode(&snapshot_with(&[]));

        assert_eq!(payload.trend, None);
        assert_eq!(payload.time_in_range_pct, 0.0);
    }

    #[test]
    fn test_encode_to_json_fields() {
        let encoder = DashboardEncoder::new(&StoreConfig::default());
        let json = encoder.encode_to_json(&snapshot_with(&[6.0])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["trend"], "stable");
        assert_eq!(value["target"]["unit"], "mmol/L");
        assert_eq!(value["series"]["glucose"]["average"], 6.0);
        assert_eq!(value["summary"]["current_value"], 6.0);
    }

    #[test]
    fn test_unique_instance_ids() {
        let config = StoreConfig::default();
        let a = DashboardEncoder::new(&config);
        let b = DashboardEncoder::new(&config);
        assert_ne!(a.instance_id(), b.instance_id());
    }
}
