//! C ABI for the Verith desktop GUI.
//!
//! Every call returns a heap-allocated JSON string shaped like
//! `{"success": bool, "error_code"?: str, "error_message"?: str, "data"?: any}`
//! which the caller releases with [`verith_free_string`].
//!
//! The process holds one [`LicenseManager`] behind a mutex, so concurrent GUI
//! calls are serialized here rather than in the core.

mod license;

pub use license::{verith_license_activate, verith_license_check_status};

use serde::Serialize;
use std::ffi::{CStr, CString, c_char};
use std::sync::{Mutex, MutexGuard};
use tracing::info;
use verith_license::{LicenseConfig, LicenseError, LicenseManager};

static HANDLE: Mutex<Option<LicenseManager>> = Mutex::new(None);

pub(crate) fn lock_handle() -> MutexGuard<'static, Option<LicenseManager>> {
    HANDLE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Response envelope serialized across the C boundary.
#[derive(Debug, Serialize)]
pub(crate) struct SdkResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl SdkResponse {
    pub(crate) fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error_code: None,
            error_message: None,
            data: Some(data),
        }
    }

    pub(crate) fn ok_empty() -> Self {
        Self {
            success: true,
            error_code: None,
            error_message: None,
            data: None,
        }
    }

    pub(crate) fn err(code: &str, message: &str) -> Self {
        Self {
            success: false,
            error_code: Some(code.to_string()),
            error_message: Some(message.to_string()),
            data: None,
        }
    }

    pub(crate) fn from_error(e: &LicenseError) -> Self {
        Self::err(e.code(), &e.to_string())
    }

    pub(crate) fn into_c_string(self) -> *mut c_char {
        let json = serde_json::to_string(&self).unwrap_or_else(|_| {
            concat!(
                r#"{"success":false,"error_code":"serialization_error","#,
                r#""error_message":"Failed to serialize response"}"#
            )
            .to_string()
        });
        CString::new(json).unwrap_or_default().into_raw()
    }
}

/// Reads a required C string argument.
///
/// # Safety
/// `ptr` must be null or a valid null-terminated string.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, SdkResponse> {
    if ptr.is_null() {
        return Err(SdkResponse::err("null_pointer", &format!("{what} is null")));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| SdkResponse::err("invalid_utf8", &format!("{what} is not valid UTF-8")))
}

/// Installs a log subscriber when `VERITH_LOG` is set. Safe to call repeatedly.
fn init_logging() {
    if let Ok(filter) = tracing_subscriber::EnvFilter::try_from_env("VERITH_LOG") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

/// Initializes the license runtime.
///
/// `config_json` is an optional JSON `LicenseConfig`; unspecified fields take
/// their defaults. When null, defaults plus the `VERITH_*` environment
/// overrides are used. Re-initializing replaces the previous runtime.
///
/// # Safety
/// `config_json` must be null or a valid null-terminated UTF-8 string.
/// The returned pointer must be freed with `verith_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verith_license_init(config_json: *const c_char) -> *mut c_char {
    unsafe { init_inner(config_json) }.into_c_string()
}

unsafe fn init_inner(config_json: *const c_char) -> SdkResponse {
    init_logging();

    let config = if config_json.is_null() {
        LicenseConfig::from_env()
    } else {
        let json = match unsafe { read_str(config_json, "config") } {
            Ok(s) => s,
            Err(resp) => return resp,
        };
        match serde_json::from_str::<LicenseConfig>(json) {
            Ok(c) => c,
            Err(e) => return SdkResponse::err("json_parse_error", &format!("Invalid config: {e}")),
        }
    };

    let manager = match LicenseManager::from_config(&config) {
        Ok(m) => m,
        Err(e) => return SdkResponse::from_error(&e),
    };

    *lock_handle() = Some(manager);
    info!("License runtime initialized, state at {}", config.state_path().display());

    SdkResponse::ok(serde_json::json!({
        "state_path": config.state_path().display().to_string(),
        "api_base_url": config.api_base_url,
    }))
}

/// Drops the license runtime. Later calls report `not_initialized`.
#[unsafe(no_mangle)]
pub extern "C" fn verith_license_shutdown() {
    lock_handle().take();
}

/// Frees a string returned by any `verith_*` function.
///
/// # Safety
/// `ptr` must be null or a pointer returned by this library, freed only once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verith_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}
