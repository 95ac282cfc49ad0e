//! Identity of this machine as an activation instance.
//!
//! The licensing server counts activations per instance name, so the name
//! should stay stable across reboots. The hostname is used when readable.

use crate::config::FALLBACK_INSTANCE_NAME;

/// The instance name for this machine: its hostname, or a fixed fallback.
#[must_use]
pub fn instance_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| FALLBACK_INSTANCE_NAME.to_string())
}
