//! Live refresh loop
//!
//! Drives [`TelemetryStore::refresh_live_sample`] on a fixed cadence from a
//! dedicated thread. The task holds only a weak handle to the store and stops
//! when asked, when dropped, or once the store has been dropped.

use crate::error::PulseError;
use crate::store::{TelemetryStore, WeakStore};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a running refresh loop
pub struct RefreshTask {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
    interval: Duration,
}

impl RefreshTask {
    /// Spawn a loop refreshing `store` every `interval`
    pub fn spawn(store: &TelemetryStore, interval: Duration) -> Result<Self, PulseError> {
        if interval.is_zero() {
            return Err(PulseError::Scheduler(
                "refresh interval must be greater than zero".to_string(),
            ));
        }

        let weak = store.downgrade();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let ticks = Arc::new(AtomicU64::new(0));
        let task_ticks = Arc::clone(&ticks);

        let handle = thread::Builder::new()
            .name("pulse-refresh".to_string())
            .spawn(move || {
                info!("Refresh loop started ({interval:?} cadence)");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    if !refresh_once(&weak) {
                        break;
                    }
                    task_ticks.fetch_add(1, Ordering::Relaxed);
                }
                info!("Refresh loop stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            ticks,
            interval,
        })
    }

    /// Spawn a loop using the store's configured refresh interval
    pub fn spawn_configured(store: &TelemetryStore) -> Result<Self, PulseError> {
        let interval = Duration::from_secs(store.config().refresh_interval_secs);
        Self::spawn(store, interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of refreshes attempted so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// True while the loop thread is alive
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop scheduling refreshes and wait for the loop to exit
    pub fn stop(&mut self) {
        // Dropping the sender wakes the loop even if it is mid-sleep.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Refresh loop panicked");
            }
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run one refresh; false once the store is gone
fn refresh_once(weak: &WeakStore) -> bool {
    let Some(store) = weak.upgrade() else {
        debug!("Store dropped, ending refresh loop");
        return false;
    };
    if let Err(e) = store.refresh_live_sample() {
        warn!("Live refresh failed: {e}");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::types::{MetricKind, StoreEvent};
    use std::time::Instant;

    fn empty_store() -> TelemetryStore {
        TelemetryStore::with_config(StoreConfig::with_window(0, 5).seeded(1)).unwrap()
    }

    #[test]
    fn test_task_refreshes_on_cadence() {
        let store = empty_store();
        let rx = store.subscribe();
        let mut task = RefreshTask::spawn(&store, Duration::from_millis(10)).unwrap();

        for _ in 0..3 {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert!(matches!(event, StoreEvent::Refreshed { .. }));
        }
        task.stop();

        assert!(task.ticks() >= 3);
        assert!(store.series(MetricKind::Glucose).len() >= 3);
        assert!(store.snapshot().is_sorted());
    }

    #[test]
    fn test_stop_wakes_sleeping_loop() {
        let store = empty_store();
        let mut task = RefreshTask::spawn(&store, Duration::from_secs(3600)).unwrap();
        assert!(task.is_running());

        let started = Instant::now();
        task.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!task.is_running());
        assert_eq!(task.ticks(), 0);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_loop_ends_when_store_dropped() {
        let store = empty_store();
        let task = RefreshTask::spawn(&store, Duration::from_millis(5)).unwrap();
        drop(store);

        let deadline = Instant::now() + Duration::from_secs(5);
        while task.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!task.is_running());
    }

    #[test]
    fn test_drop_stops_task() {
        let store = empty_store();
        let task = RefreshTask::spawn(&store, Duration::from_millis(5)).unwrap();
        drop(task);

        let revision = store.revision();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let store = empty_store();
        assert!(RefreshTask::spawn(&store, Duration::ZERO).is_err());
    }

    #[test]
    fn test_configured_interval() {
        let store = empty_store();
        let task = RefreshTask::spawn_configured(&store).unwrap();
        assert_eq!(task.interval(), Duration::from_secs(5));
    }
}
