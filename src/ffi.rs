//! FFI bindings for Synheart Pulse
//!
//! This module provides C-compatible functions for driving a telemetry store
//! from a mobile host. Strings are null-terminated; every returned string is
//! allocated by Pulse and must be freed by the caller with `pulse_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::encoder::DashboardEncoder;
use crate::error::PulseError;
use crate::metrics::derive_trend;
use crate::scheduler::RefreshTask;
use crate::store::TelemetryStore;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Report a result as a C string, recording the error on failure
fn json_result(result: Result<String, PulseError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Report a result as a status code, recording the error on failure
fn status_result<T>(result: Result<T, PulseError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Store API
// ============================================================================

/// Opaque store handle for FFI
pub struct PulseStoreHandle {
    store: TelemetryStore,
    encoder: DashboardEncoder,
    refresh: Option<RefreshTask>,
}

/// Create a new telemetry store.
///
/// # Safety
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `pulse_store_free`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_new(config_json: *const c_char) -> *mut PulseStoreHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        StoreConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match StoreConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match TelemetryStore::with_config(config) {
        Ok(store) => {
            let encoder = DashboardEncoder::new(store.config());
            Box::into_raw(Box::new(PulseStoreHandle {
                store,
                encoder,
                refresh: None,
            }))
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a store, stopping its refresh loop if running.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_free(store: *mut PulseStoreHandle) {
    if !store.is_null() {
        drop(Box::from_raw(store));
    }
}

/// Append one live glucose sample.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_refresh(store: *mut PulseStoreHandle) -> i32 {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return -1;
    }

    let handle = &*store;
    status_result(handle.store.refresh_live_sample())
}

/// Redraw every value in the store.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_shuffle(store: *mut PulseStoreHandle) -> i32 {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return -1;
    }

    let handle = &*store;
    status_result(handle.store.shuffle_all())
}

/// Regenerate every series ending now.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_reset(store: *mut PulseStoreHandle) -> i32 {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return -1;
    }

    let handle = &*store;
    status_result(handle.store.reset())
}

/// Serialize the current snapshot (all series and summary) to JSON.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_snapshot_json(store: *mut PulseStoreHandle) -> *mut c_char {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return ptr::null_mut();
    }

    let handle = &*store;
    let snapshot = handle.store.snapshot();
    json_result(serde_json::to_string(&*snapshot).map_err(PulseError::JsonError))
}

/// Encode the current snapshot as a dashboard payload.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_dashboard_json(store: *mut PulseStoreHandle) -> *mut c_char {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return ptr::null_mut();
    }

    let handle = &*store;
    let snapshot = handle.store.snapshot();
    json_result(handle.encoder.encode_to_json(&snapshot))
}

/// Start the live refresh loop, replacing any loop already running.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`.
/// - `interval_secs` of 0 uses the configured refresh interval.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_start_refresh(
    store: *mut PulseStoreHandle,
    interval_secs: u64,
) -> i32 {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return -1;
    }

    let handle = &mut *store;
    if let Some(mut task) = handle.refresh.take() {
        task.stop();
    }

    let task = if interval_secs == 0 {
        RefreshTask::spawn_configured(&handle.store)
    } else {
        RefreshTask::spawn(&handle.store, Duration::from_secs(interval_secs))
    };

    match task {
        Ok(task) => {
            handle.refresh = Some(task);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Stop the live refresh loop if running.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_stop_refresh(store: *mut PulseStoreHandle) -> i32 {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return -1;
    }

    let handle = &mut *store;
    if let Some(mut task) = handle.refresh.take() {
        task.stop();
    }
    0
}

/// Current snapshot revision, or -1 for a NULL store.
///
/// # Safety
/// - `store` must be a valid pointer returned by `pulse_store_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn pulse_store_revision(store: *mut PulseStoreHandle) -> i64 {
    if store.is_null() {
        return -1;
    }
    (*store).store.revision() as i64
}

// ============================================================================
// Stateless API
// ============================================================================

/// Trend label ("rising", "falling" or "stable") of a glucose value.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_trend(value: f64) -> *const c_char {
    static RISING: &[u8] = b"rising\0";
    static FALLING: &[u8] = b"falling\0";
    static STABLE: &[u8] = b"stable\0";

    let label = match derive_trend(value) {
        crate::types::TrendLabel::Rising => RISING,
        crate::types::TrendLabel::Falling => FALLING,
        crate::types::TrendLabel::Stable => STABLE,
    };
    label.as_ptr() as *const c_char
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pulse functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Pulse function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Pulse library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn small_config() -> CString {
        CString::new(r#"{"window_days": 1, "sample_interval_minutes": 60, "seed": 3}"#).unwrap()
    }

    #[test]
    fn test_ffi_store_lifecycle() {
        let config = small_config();

        unsafe {
            let store = pulse_store_new(config.as_ptr());
            assert!(!store.is_null());
            assert_eq!(pulse_store_revision(store), 0);

            assert_eq!(pulse_store_refresh(store), 0);
            assert_eq!(pulse_store_shuffle(store), 0);
            assert_eq!(pulse_store_reset(store), 0);
            assert_eq!(pulse_store_revision(store), 3);

            let snapshot = pulse_store_snapshot_json(store);
            assert!(!snapshot.is_null());
            let snapshot_str = CStr::from_ptr(snapshot).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(snapshot_str).unwrap();
            assert_eq!(value["revision"], 3);
            assert_eq!(value["series"]["glucose"].as_array().unwrap().len(), 24);
            pulse_free_string(snapshot);

            let dashboard = pulse_store_dashboard_json(store);
            assert!(!dashboard.is_null());
            let dashboard_str = CStr::from_ptr(dashboard).to_str().unwrap();
            assert!(dashboard_str.contains("time_in_range_pct"));
            pulse_free_string(dashboard);

            pulse_store_free(store);
        }
    }

    #[test]
    fn test_ffi_default_config() {
        unsafe {
            let store = pulse_store_new(ptr::null());
            assert!(!store.is_null());
            pulse_store_free(store);
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let config = CString::new(r#"{"live_capacity": 0}"#).unwrap();

        unsafe {
            let store = pulse_store_new(config.as_ptr());
            assert!(store.is_null());

            let error = pulse_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("live_capacity"));
        }
    }

    #[test]
    fn test_ffi_oversized_window_returns_null() {
        let config =
            CString::new(r#"{"window_days": 100000000, "sample_interval_minutes": 1000000}"#)
                .unwrap();

        unsafe {
            let store = pulse_store_new(config.as_ptr());
            assert!(store.is_null());
            let error_str = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(error_str.contains("window_days"));
        }
    }

    #[test]
    fn test_ffi_refresh_loop() {
        let config = small_config();

        unsafe {
            let store = pulse_store_new(config.as_ptr());
            assert_eq!(pulse_store_start_refresh(store, 3600), 0);
            assert!((*store).refresh.is_some());
            assert_eq!(pulse_store_stop_refresh(store), 0);
            assert!((*store).refresh.is_none());
            pulse_store_free(store);
        }
    }

    #[test]
    fn test_ffi_null_store() {
        unsafe {
            assert_eq!(pulse_store_refresh(ptr::null_mut()), -1);
            assert!(pulse_store_snapshot_json(ptr::null_mut()).is_null());
            assert_eq!(pulse_store_revision(ptr::null_mut()), -1);
            pulse_store_free(ptr::null_mut());
        }
    }

    #[test]
    fn test_ffi_trend() {
        unsafe {
            let label = |v| CStr::from_ptr(pulse_trend(v)).to_str().unwrap();
            assert_eq!(label(9.0), "rising");
            assert_eq!(label(3.0), "falling");
            assert_eq!(label(8.5), "stable");
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = pulse_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
