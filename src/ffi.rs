//! FFI bindings for Posture Flux
//!
//! This module provides C-compatible functions for driving a posture session
//! from other languages. Frames and results cross the boundary as JSON C
//! strings; returned strings must be freed with `posture_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::fmt::Display;
use std::os::raw::c_char;
use std::ptr;

use serde::Serialize;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::risk::classify_risk;
use crate::session::PostureSession;
use crate::types::Frame;

thread_local! {
    /// Message behind the most recent failed call on this thread
    static ERROR_SLOT: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn reset_error() {
    ERROR_SLOT.with(|slot| *slot.borrow_mut() = None);
}

/// Record `err` for `posture_last_error` and hand back the failure sentinel
fn fail<T>(err: impl Display, sentinel: T) -> T {
    let message = CString::new(err.to_string()).ok();
    ERROR_SLOT.with(|slot| *slot.borrow_mut() = message);
    sentinel
}

/// Owned copy of the UTF-8 text behind a C pointer, `None` for NULL or bad UTF-8
unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        CStr::from_ptr(ptr).to_str().ok().map(str::to_owned)
    }
}

/// Serialize `value` into a caller-owned C string, NULL on failure
fn json_out<T: Serialize>(value: &T) -> *mut c_char {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => return fail(MonitorError::from(e), ptr::null_mut()),
    };
    match CString::new(json) {
        Ok(text) => text.into_raw(),
        Err(e) => fail(e, ptr::null_mut()),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify risk from score and fatigue with the canonical table.
///
/// Returns the ordinal tier: 0 = LOW, 1 = MODERATE, 2 = HIGH, 3 = SEVERE,
/// 4 = CRITICAL.
#[no_mangle]
pub extern "C" fn posture_classify_risk(score: f64, fatigue: f64) -> i32 {
    classify_risk(score, fatigue) as i32
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a PostureSession
pub struct PostureSessionHandle {
    session: PostureSession,
}

/// Create a new posture session.
///
/// # Safety
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `posture_session_free`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_session_new(config_json: *const c_char) -> *mut PostureSessionHandle {
    reset_error();

    let config = if config_json.is_null() {
        MonitorConfig::default()
    } else {
        let Some(json_str) = read_c_str(config_json) else {
            return fail("Invalid config string pointer", ptr::null_mut());
        };
        match MonitorConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => return fail(e, ptr::null_mut()),
        }
    };

    match PostureSession::with_config(config) {
        Ok(session) => Box::into_raw(Box::new(PostureSessionHandle { session })),
        Err(e) => fail(e, ptr::null_mut()),
    }
}

/// Free a posture session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posture_session_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posture_session_free(session: *mut PostureSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Process one frame and return the tick output as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posture_session_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_session_tick(
    session: *mut PostureSessionHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    reset_error();

    let Some(handle) = session.as_mut() else {
        return fail("Null session pointer", ptr::null_mut());
    };
    let Some(json_str) = read_c_str(frame_json) else {
        return fail("Invalid frame string pointer", ptr::null_mut());
    };
    let frame: Frame = match serde_json::from_str(&json_str) {
        Ok(frame) => frame,
        Err(e) => return fail(MonitorError::from(e), ptr::null_mut()),
    };

    json_out(&handle.session.tick(&frame))
}

/// Switch the session to degraded mode for the rest of its lifetime.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posture_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn posture_session_enter_degraded(
    session: *mut PostureSessionHandle,
    now_ms: i64,
) -> i32 {
    reset_error();

    match session.as_mut() {
        Some(handle) => {
            handle.session.enter_degraded(now_ms);
            0
        }
        None => fail("Null session pointer", -1),
    }
}

/// Produce a synthetic degraded-mode tick as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posture_session_new`.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_session_tick_degraded(
    session: *mut PostureSessionHandle,
    now_ms: i64,
) -> *mut c_char {
    reset_error();

    match session.as_mut() {
        Some(handle) => json_out(&handle.session.tick_degraded(now_ms)),
        None => fail("Null session pointer", ptr::null_mut()),
    }
}

/// Save session state to JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posture_session_new`.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_session_save_state(
    session: *mut PostureSessionHandle,
) -> *mut c_char {
    reset_error();

    match session.as_ref() {
        Some(handle) => json_out(&handle.session.state()),
        None => fail("Null session pointer", ptr::null_mut()),
    }
}

/// Load session state from JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posture_session_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_session_load_state(
    session: *mut PostureSessionHandle,
    json: *const c_char,
) -> i32 {
    reset_error();

    let Some(handle) = session.as_mut() else {
        return fail("Null session pointer", -1);
    };
    let Some(json_str) = read_c_str(json) else {
        return fail("Invalid JSON string pointer", -1);
    };

    match handle.session.load_state(&json_str) {
        Ok(()) => 0,
        Err(e) => fail(e, -1),
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Posture Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Posture Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posture_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Posture Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn posture_last_error() -> *const c_char {
    ERROR_SLOT.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |msg| msg.as_ptr()))
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn posture_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
