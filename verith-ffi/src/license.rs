//! License status and activation exports.
//!
//! Both return a `LicenseSnapshot` as `data` on success.

use crate::{SdkResponse, lock_handle, read_str};
use std::ffi::c_char;
use verith_license::{LicenseManager, LicenseRecord, LicenseSnapshot};

fn snapshot_json(manager: &LicenseManager, record: &LicenseRecord) -> SdkResponse {
    let snapshot =
        LicenseSnapshot::from_record(record, manager.now(), manager.policy().trial_days);
    match serde_json::to_value(snapshot) {
        Ok(v) => SdkResponse::ok(v),
        Err(e) => SdkResponse::err("serialization_error", &e.to_string()),
    }
}

/// Evaluates the license: trial aging, anti-rollback, revalidation when due.
///
/// Blocks on disk, credential store and (at most once a day) network I/O.
/// A `corrupt_state` error means the GUI must not start a trial on its own.
/// The returned pointer must be freed with `verith_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn verith_license_check_status() -> *mut c_char {
    check_status_inner().into_c_string()
}

fn check_status_inner() -> SdkResponse {
    let handle = lock_handle();
    let manager = match handle.as_ref() {
        Some(m) => m,
        None => return SdkResponse::err("not_initialized", "License runtime not initialized"),
    };

    match manager.check_status() {
        Ok(record) => snapshot_json(manager, &record),
        Err(e) => SdkResponse::from_error(&e),
    }
}

/// Activates a license key with the licensing server.
///
/// # Safety
/// `key` must be a valid null-terminated UTF-8 string.
/// The returned pointer must be freed with `verith_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verith_license_activate(key: *const c_char) -> *mut c_char {
    unsafe { activate_inner(key) }.into_c_string()
}

unsafe fn activate_inner(key: *const c_char) -> SdkResponse {
    let key = match unsafe { read_str(key, "license key") } {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let handle = lock_handle();
    let manager = match handle.as_ref() {
        Some(m) => m,
        None => return SdkResponse::err("not_initialized", "License runtime not initialized"),
    };

    match manager.activate_license(key) {
        Ok(record) => snapshot_json(manager, &record),
        Err(e) => SdkResponse::from_error(&e),
    }
}
