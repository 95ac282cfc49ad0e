//! Configuration for the license core.

use crate::record::TRIAL_DAYS;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default licensing API (Lemon Squeezy license API).
pub const DEFAULT_API_BASE_URL: &str = "https://api.lemonsqueezy.com";

/// Instance name sent when the hostname cannot be read.
pub const FALLBACK_INSTANCE_NAME: &str = "Verith-Workstation";

/// Settings for state location, remote API and trial policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Application identity; names the data directory.
    pub app_name: String,
    /// Overrides the per-user data directory.
    pub data_dir: Option<PathBuf>,
    /// File name of the license record inside the data directory.
    pub state_file_name: String,
    /// Base URL of the licensing API (e.g. `https://api.lemonsqueezy.com`).
    pub api_base_url: String,
    /// Optional bearer token for the licensing API.
    pub api_key: Option<String>,
    /// Length of the free trial.
    pub trial_days: i64,
    /// Minimum time between two revalidations of an active license.
    pub revalidate_interval_secs: u64,
    /// Request timeout for activation.
    pub activation_timeout_secs: u64,
    /// Request timeout for revalidation.
    pub validation_timeout_secs: u64,
    /// Credential store service holding the install date.
    pub keyring_service: String,
    /// Credential store account holding the install date.
    pub keyring_user: String,
    /// Overrides the instance name sent on activation (defaults to hostname).
    pub instance_name: Option<String>,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            app_name: "Verith".to_string(),
            data_dir: None,
            state_file_name: "license.json".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            trial_days: TRIAL_DAYS,
            revalidate_interval_secs: 24 * 60 * 60,
            activation_timeout_secs: 15,
            validation_timeout_secs: 10,
            keyring_service: "Verith".to_string(),
            keyring_user: "InstallDate".to_string(),
            instance_name: None,
        }
    }
}

impl LicenseConfig {
    /// Defaults with `VERITH_DATA_DIR`, `VERITH_LICENSE_API_URL` and
    /// `VERITH_LICENSE_API_KEY` applied on top.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment overrides to an existing config.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env::var_os("VERITH_DATA_DIR").filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = env::var("VERITH_LICENSE_API_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(key) = env::var("VERITH_LICENSE_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        self
    }

    /// Directory holding the license record.
    ///
    /// Falls back to the current directory when the platform has no data dir.
    #[must_use]
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(&self.app_name)
    }

    /// Full path of the license record.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.resolve_data_dir().join(&self.state_file_name)
    }

    /// Trial and revalidation rules derived from this config.
    #[must_use]
    pub fn policy(&self) -> LicensePolicy {
        LicensePolicy {
            trial_days: self.trial_days,
            revalidate_interval: i64::try_from(self.revalidate_interval_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Instance name to register on activation.
    #[must_use]
    pub fn resolve_instance_name(&self) -> String {
        self.instance_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(crate::instance::instance_name)
    }
}

/// The rules the license manager enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LicensePolicy {
    /// A trial expires once more than this many whole days have passed.
    pub trial_days: i64,
    /// An active license is revalidated once its last check is this old.
    pub revalidate_interval: Duration,
}

impl Default for LicensePolicy {
    fn default() -> Self {
        LicenseConfig::default().policy()
    }
}
