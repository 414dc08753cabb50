//! Synheart Pulse - Mock telemetry store for glucose and insulin dashboards
//!
//! Pulse generates plausible health time series without any sensor input and
//! keeps them live for dashboard rendering: historical generation → live
//! refresh on a fixed cadence → derived metrics → dashboard encoding.
//!
//! ## Modules
//!
//! - **Store**: single-writer snapshot store with refresh, shuffle and reset
//! - **Source**: pluggable telemetry capability with a seeded random mock
//! - **Metrics**: trend labels, time-in-range and series statistics
//! - **Scheduler**: cancellable refresh loop

pub mod config;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{MetricRange, StoreConfig};
pub use encoder::{DashboardEncoder, DashboardPayload};
pub use error::PulseError;
pub use metrics::{compute_time_in_range, derive_trend, SeriesStats};
pub use scheduler::RefreshTask;
pub use source::{MockSource, TelemetrySource};
pub use store::{TelemetryStore, WeakStore};
pub use types::{MetricKind, StoreEvent, StoreSnapshot, SummaryMetrics, TimeSeriesPoint, TrendLabel};

/// Pulse version embedded in dashboard payloads
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for dashboard payloads
pub const PRODUCER_NAME: &str = "synheart-pulse";
