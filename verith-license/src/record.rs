//! The persisted license record and its status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the free trial, in days.
pub const TRIAL_DAYS: i64 = 15;

/// Where a license is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LicenseStatus {
    /// Inside the free trial window.
    Trial,
    /// Activated with a key the server still honours.
    Active,
    /// Trial ran out, or the server stopped honouring the key.
    Expired,
}

impl LicenseStatus {
    /// Returns true if the application may be used (Trial or Active).
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Trial | Self::Active)
    }

    /// Returns the on-disk spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "TRIAL",
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The license state kept in the local state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// First run of the application. Only anti-rollback reconciliation moves it.
    pub install_date: DateTime<Utc>,
    /// Key supplied at activation; empty while on trial.
    #[serde(default)]
    pub license_key: String,
    /// Activation instance assigned by the licensing server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Current lifecycle state.
    pub status: LicenseStatus,
    /// Last remote validation (or record creation).
    pub last_check: DateTime<Utc>,
}

impl LicenseRecord {
    /// A brand new trial starting at `now`.
    #[must_use]
    pub fn new_trial(now: DateTime<Utc>) -> Self {
        Self {
            install_date: now,
            license_key: String::new(),
            instance_id: None,
            status: LicenseStatus::Trial,
            last_check: now,
        }
    }

    /// Whole days elapsed since install, truncated toward zero.
    ///
    /// Negative when the install date lies in the future.
    #[must_use]
    pub fn days_since_install(&self, now: DateTime<Utc>) -> i64 {
        (now - self.install_date).num_hours() / 24
    }

    /// Days of trial left for display; never negative.
    #[must_use]
    pub fn trial_days_remaining(&self, now: DateTime<Utc>, trial_days: i64) -> i64 {
        (trial_days - self.days_since_install(now)).max(0)
    }

    /// Key reduced to its last four characters, for logs and UI.
    #[must_use]
    pub fn license_key_hint(&self) -> Option<String> {
        mask_key(&self.license_key)
    }
}

/// Masks a license key down to its last four characters.
pub(crate) fn mask_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    Some(format!("****{tail}"))
}

/// What the GUI needs to decide whether to block, warn or proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSnapshot {
    /// Current lifecycle state.
    pub status: LicenseStatus,
    /// Effective install date (after anchor reconciliation).
    pub install_date: DateTime<Utc>,
    /// Last remote validation.
    pub last_check: DateTime<Utc>,
    /// Days of trial left; zero outside the trial.
    pub trial_days_remaining: i64,
    /// Masked license key, when activated.
    pub license_key_hint: Option<String>,
    /// Activation instance, when activated.
    pub instance_id: Option<String>,
}

impl LicenseSnapshot {
    /// Builds the snapshot of `record` as seen at `now`.
    #[must_use]
    pub fn from_record(record: &LicenseRecord, now: DateTime<Utc>, trial_days: i64) -> Self {
        let trial_days_remaining = match record.status {
            LicenseStatus::Trial => record.trial_days_remaining(now, trial_days),
            LicenseStatus::Active | LicenseStatus::Expired => 0,
        };
        Self {
            status: record.status,
            install_date: record.install_date,
            last_check: record.last_check,
            trial_days_remaining,
            license_key_hint: record.license_key_hint(),
            instance_id: record.instance_id.clone(),
        }
    }
}
