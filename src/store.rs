//! Telemetry store
//!
//! The store is the aggregate root owning every series and the header summary.
//! It follows a single-writer, many-reader discipline:
//!
//! - Mutations serialize on the writer lock (which also owns the source),
//!   build a complete new [`StoreSnapshot`] and publish it with one
//!   lock-free swap.
//! - Readers load the published `Arc` and always see either the old or the
//!   new state, never a partially appended or truncated series.
//! - Subscribers receive a [`StoreEvent`] after each publish.

use crate::config::StoreConfig;
use crate::error::PulseError;
use crate::metrics::{compute_time_in_range, derive_trend, summarize};
use crate::source::{MockSource, TelemetrySource};
use crate::types::{
    MetricKind, SampleWindow, StoreEvent, StoreSnapshot, SummaryMetrics, TimeSeriesPoint,
    TrendLabel,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};

struct StoreInner {
    config: StoreConfig,
    published: ArcSwap<StoreSnapshot>,
    writer: Mutex<Box<dyn TelemetrySource>>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

/// Shared handle to a telemetry store. Clones refer to the same store.
#[derive(Clone)]
pub struct TelemetryStore {
    inner: Arc<StoreInner>,
}

/// Non-owning handle that does not keep the store alive
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    /// Recover a strong handle if the store still exists
    pub fn upgrade(&self) -> Option<TelemetryStore> {
        self.inner.upgrade().map(|inner| TelemetryStore { inner })
    }
}

impl TelemetryStore {
    /// Populate a mock-backed store with `window_days` of history sampled every
    /// `sample_interval_minutes`, ending now.
    pub fn initialize(window_days: u32, sample_interval_minutes: u32) -> Result<Self, PulseError> {
        Self::with_config(StoreConfig::with_window(window_days, sample_interval_minutes))
    }

    /// Populate a mock-backed store from a full configuration
    pub fn with_config(config: StoreConfig) -> Result<Self, PulseError> {
        let source = MockSource::new(config.clone());
        Self::with_source(config, Box::new(source))
    }

    /// Populate a store from any telemetry source
    pub fn with_source(
        config: StoreConfig,
        source: Box<dyn TelemetrySource>,
    ) -> Result<Self, PulseError> {
        Self::with_source_at(config, source, Utc::now())
    }

    /// Populate a store whose history ends at `now`
    pub fn with_source_at(
        config: StoreConfig,
        mut source: Box<dyn TelemetrySource>,
        now: DateTime<Utc>,
    ) -> Result<Self, PulseError> {
        config.validate()?;
        let series = generate_series(&config, &mut *source, now)?;
        let summary = summarize(&series, now);
        debug!(
            "Initialized store with {} historical points per series",
            config.history_len()
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                published: ArcSwap::from_pointee(StoreSnapshot {
                    revision: 0,
                    series,
                    summary,
                }),
                writer: Mutex::new(source),
                subscribers: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Current published snapshot
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.inner.published.load_full()
    }

    /// Copy of one series from the current snapshot
    pub fn series(&self, kind: MetricKind) -> Vec<TimeSeriesPoint> {
        self.snapshot().series(kind).to_vec()
    }

    pub fn summary(&self) -> SummaryMetrics {
        self.snapshot().summary.clone()
    }

    pub fn revision(&self) -> u64 {
        self.snapshot().revision
    }

    /// Trend of the latest glucose reading
    pub fn current_trend(&self) -> Option<TrendLabel> {
        self.snapshot()
            .latest(MetricKind::Glucose)
            .map(|p| derive_trend(p.value))
    }

    /// Glucose time-in-range against the configured target band
    pub fn time_in_range(&self) -> f64 {
        let config = &self.inner.config;
        compute_time_in_range(
            self.snapshot().series(MetricKind::Glucose),
            config.target_low,
            config.target_high,
        )
    }

    /// Receive an event after every published mutation
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Append a live glucose sample taken now and trim to the live capacity
    pub fn refresh_live_sample(&self) -> Result<TimeSeriesPoint, PulseError> {
        self.refresh_live_sample_at(Utc::now())
    }

    /// Append a live glucose sample taken at `at` and trim to the live capacity.
    ///
    /// A timestamp older than the newest sample is raised to it so the series
    /// stays sorted.
    pub fn refresh_live_sample_at(&self, at: DateTime<Utc>) -> Result<TimeSeriesPoint, PulseError> {
        let mut source = self.inner.writer.lock();
        let current = self.snapshot();
        let mut series = current.series.clone();
        let glucose = series.entry(MetricKind::Glucose).or_default();

        let at = match glucose.last() {
            Some(last) if last.timestamp > at => {
                warn!(
                    "Live sample at {} precedes newest sample at {}, clamping",
                    at, last.timestamp
                );
                last.timestamp
            }
            _ => at,
        };

        let point = source.fetch_latest(MetricKind::Glucose, at)?;
        glucose.push(point);

        let capacity = self.inner.config.live_capacity;
        if glucose.len() > capacity {
            let excess = glucose.len() - capacity;
            glucose.drain(..excess);
        }

        let summary = summarize(&series, at);
        let revision = self.publish(&current, series, summary, |revision| {
            StoreEvent::Refreshed { revision }
        });
        debug!(
            "Refreshed live sample {:.2} {} (revision {})",
            point.value,
            MetricKind::Glucose.unit(),
            revision
        );
        Ok(point)
    }

    /// Redraw every value of every series, keeping lengths and timestamps.
    ///
    /// Returns the new revision.
    pub fn shuffle_all(&self) -> Result<u64, PulseError> {
        let mut source = self.inner.writer.lock();
        let current = self.snapshot();
        let mut series = current.series.clone();

        for (kind, points) in series.iter_mut() {
            source.resample(*kind, points)?;
        }

        let summary = summarize(&series, Utc::now());
        let revision = self.publish(&current, series, summary, |revision| {
            StoreEvent::Shuffled { revision }
        });
        debug!("Shuffled all series (revision {revision})");
        Ok(revision)
    }

    /// Regenerate every series as on construction, ending now.
    ///
    /// Returns the new revision.
    pub fn reset(&self) -> Result<u64, PulseError> {
        self.reset_at(Utc::now())
    }

    /// Regenerate every series with history ending at `now`
    pub fn reset_at(&self, now: DateTime<Utc>) -> Result<u64, PulseError> {
        let mut source = self.inner.writer.lock();
        let current = self.snapshot();
        let series = generate_series(&self.inner.config, &mut **source, now)?;
        let summary = summarize(&series, now);
        let revision = self.publish(&current, series, summary, |revision| {
            StoreEvent::Reset { revision }
        });
        debug!("Reset store (revision {revision})");
        Ok(revision)
    }

    /// Swap in a new snapshot and notify subscribers. Caller holds the writer lock.
    fn publish(
        &self,
        current: &StoreSnapshot,
        series: BTreeMap<MetricKind, Vec<TimeSeriesPoint>>,
        summary: SummaryMetrics,
        event: impl FnOnce(u64) -> StoreEvent,
    ) -> u64 {
        let revision = current.revision + 1;
        let snapshot = Arc::new(StoreSnapshot {
            revision,
            series,
            summary,
        });
        self.inner.published.store(snapshot);

        let event = event(revision);
        self.inner
            .subscribers
            .lock()
            .retain(|tx| tx.send(event).is_ok());
        revision
    }
}

/// Build every series for a store whose history ends at `now`
fn generate_series(
    config: &StoreConfig,
    source: &mut dyn TelemetrySource,
    now: DateTime<Utc>,
) -> Result<BTreeMap<MetricKind, Vec<TimeSeriesPoint>>, PulseError> {
    let interval = Duration::minutes(i64::from(config.sample_interval_minutes));
    let history = SampleWindow::ending_at(now, interval, config.history_len()).ok_or_else(|| {
        PulseError::InvalidConfig("history window leaves the supported date range".to_string())
    })?;
    let prediction = SampleWindow::following(now, interval, config.prediction_points)
        .ok_or_else(|| {
            PulseError::InvalidConfig(
                "prediction window leaves the supported date range".to_string(),
            )
        })?;

    let mut series = BTreeMap::new();
    for kind in MetricKind::HISTORICAL {
        series.insert(kind, source.fetch_history(kind, &history)?);
    }
    series.insert(
        MetricKind::PredictedGlucose,
        source.fetch_history(MetricKind::PredictedGlucose, &prediction)?,
    );
    Ok(series)
}
