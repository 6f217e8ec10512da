//! FFI bindings for Calma
//!
//! This module provides C-compatible functions for calling the stress engine
//! from the mobile app. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `calma_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::engine::DecisionEngine;
use crate::types::SensorReading;
use crate::units::{hz_to_rpm, rpm_to_hz};
use crate::validation::validate_reading;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to a DecisionEngine
pub struct CalmaEngineHandle {
    engine: DecisionEngine,
}

/// Load LSTM weights and create an engine.
///
/// # Safety
/// - `weights_path` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer that must be freed with `calma_engine_free`.
/// - Returns NULL on error; call `calma_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calma_engine_new(
    weights_path: *const c_char,
    config_json: *const c_char,
) -> *mut CalmaEngineHandle {
    clear_last_error();

    let path = match cstr_to_string(weights_path) {
        Some(s) => s,
        None => {
            set_last_error("Invalid weights path pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match DecisionEngine::from_weights_path(config, path) {
        Ok(engine) => Box::into_raw(Box::new(CalmaEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calma_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn calma_engine_free(engine: *mut CalmaEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Decide on a JSON request (a reading object or `{"sequence": [[...], ...]}`).
///
/// The engine is only read, so one handle may be shared across threads.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calma_engine_new`.
/// - `input_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `calma_free_string`.
/// - Returns NULL on error; call `calma_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calma_engine_decide(
    engine: *const CalmaEngineHandle,
    input_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;

    let json_str = match cstr_to_string(input_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match handle.engine.decide_json(&json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless helpers
// ============================================================================

/// Run the advisory sensor range checks and return the report as JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `calma_free_string`.
/// - Returns NULL on error; call `calma_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calma_validate_reading(
    hr: f64,
    rmssd: f64,
    breathing_rpm: f64,
    movement: f64,
) -> *mut c_char {
    clear_last_error();

    let report = validate_reading(&SensorReading::new(hr, rmssd, breathing_rpm, movement));
    match serde_json::to_string(&report) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Convert respirations per minute to Hz.
#[no_mangle]
pub extern "C" fn calma_rpm_to_hz(rpm: f64) -> f64 {
    rpm_to_hz(rpm)
}

/// Convert Hz to respirations per minute.
#[no_mangle]
pub extern "C" fn calma_hz_to_rpm(hz: f64) -> f64 {
    hz_to_rpm(hz)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Calma functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Calma function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn calma_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Calma function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn calma_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Calma library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn calma_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::test_state_dict_json;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    /// Weights file that removes itself when dropped
    struct TempWeights(PathBuf);

    impl TempWeights {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("calma-weights-{}.json", Uuid::new_v4()));
            fs::write(&path, test_state_dict_json(4, 3, [0.0, 0.0])).unwrap();
            Self(path)
        }

        fn cstr(&self) -> CString {
            CString::new(self.0.to_str().unwrap()).unwrap()
        }
    }

    impl Drop for TempWeights {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    unsafe fn last_error() -> String {
        CStr::from_ptr(calma_last_error()).to_str().unwrap().to_string()
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        let weights = TempWeights::new();
        let path = weights.cstr();

        unsafe {
            let engine = calma_engine_new(path.as_ptr(), ptr::null());
            assert!(!engine.is_null());

            let input = CString::new(
                r#"{"hr": 125, "rmssd": 5, "breathing_rpm": 22, "movement": 0.1}"#,
            )
            .unwrap();
            let result = calma_engine_decide(engine, input.as_ptr());
            assert!(!result.is_null());

            let decision: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(decision["rule_applied"], "PANIC");
            assert_eq!(decision["stress_percentage"], 95.0);
            assert_eq!(decision["stress_level"], 3);
            assert!((decision["lstm_raw"].as_f64().unwrap() - 50.0).abs() < 1e-9);

            calma_free_string(result);
            calma_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_engine_with_config() {
        let weights = TempWeights::new();
        let path = weights.cstr();
        let config = CString::new(r#"{"seq_len": 5}"#).unwrap();

        unsafe {
            let engine = calma_engine_new(path.as_ptr(), config.as_ptr());
            assert!(!engine.is_null());

            let input =
                CString::new(r#"{"hr": 70, "rmssd": 45, "breathing_rpm": 14, "movement": 0.5}"#)
                    .unwrap();
            let result = calma_engine_decide(engine, input.as_ptr());
            let decision: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(decision["inputs"]["window_len"], 5);
            assert_eq!(decision["rule_applied"], "LSTM");

            calma_free_string(result);
            calma_engine_free(engine);

            let bad = CString::new(r#"{"seq_len": 0}"#).unwrap();
            assert!(calma_engine_new(path.as_ptr(), bad.as_ptr()).is_null());
            assert!(last_error().contains("seq_len"));
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let missing = CString::new("/nonexistent/stress_lstm.json").unwrap();
            assert!(calma_engine_new(missing.as_ptr(), ptr::null()).is_null());
            assert!(last_error().contains("Startup failed"));

            assert!(calma_engine_new(ptr::null(), ptr::null()).is_null());
            assert!(!calma_last_error().is_null());

            let input = CString::new("{}").unwrap();
            assert!(calma_engine_decide(ptr::null(), input.as_ptr()).is_null());
            assert_eq!(last_error(), "Null engine pointer");
        }
    }

    #[test]
    fn test_ffi_shape_error_keeps_engine_usable() {
        let weights = TempWeights::new();
        let path = weights.cstr();

        unsafe {
            let engine = calma_engine_new(path.as_ptr(), ptr::null());

            let bad = CString::new(r#"{"sequence": [[65, 14, 36.5]]}"#).unwrap();
            assert!(calma_engine_decide(engine, bad.as_ptr()).is_null());
            assert!(last_error().contains("Invalid sequence shape"));

            let good = CString::new(r#"{"sequence": [[65, 14, 36.5, 10], [63, 13, 36.6, 12]]}"#)
                .unwrap();
            let result = calma_engine_decide(engine, good.as_ptr());
            assert!(!result.is_null());
            assert!(calma_last_error().is_null());

            calma_free_string(result);
            calma_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_validate_reading() {
        unsafe {
            let result = calma_validate_reading(250.0, 40.0, 15.0, 0.1);
            assert!(!result.is_null());
            let report: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(report["valid"], false);
            assert_eq!(report["warnings"].as_array().unwrap().len(), 1);
            calma_free_string(result);
        }
    }

    #[test]
    fn test_ffi_unit_conversion() {
        assert!((calma_rpm_to_hz(18.0) - 0.3).abs() < 1e-12);
        assert!((calma_hz_to_rpm(0.25) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = calma_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
