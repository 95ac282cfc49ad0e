//! The license state machine.
//!
//! ```text
//!            trial > 15 days                 remote: not active
//!   Trial ─────────────────▶ Expired ◀───────────────────────── Active
//!     │                        │                                  ▲
//!     │        activation      │           activation             │
//!     └────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! [`LicenseManager::check_status`] is the only place status changes without
//! user action. It performs blocking file, credential-store and network I/O;
//! callers serialize concurrent invocations themselves.

use crate::anchor::{KeyringAnchor, TrustAnchor};
use crate::client::{LemonSqueezyClient, LicenseApi};
use crate::clock::{Clock, SystemClock};
use crate::config::{LicenseConfig, LicensePolicy};
use crate::error::{LicenseError, LicenseResult};
use crate::instance::instance_name;
use crate::record::{LicenseRecord, LicenseSnapshot, LicenseStatus, mask_key};
use crate::store::{FileStore, LicenseStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Evaluates and advances the license of this installation.
pub struct LicenseManager {
    store: Arc<dyn LicenseStore>,
    anchor: Arc<dyn TrustAnchor>,
    api: Arc<dyn LicenseApi>,
    clock: Arc<dyn Clock>,
    policy: LicensePolicy,
    instance_name: String,
}

impl LicenseManager {
    /// Creates a manager over the given collaborators, using the system clock,
    /// the default policy and the hostname as instance name.
    pub fn new(
        store: Arc<dyn LicenseStore>,
        anchor: Arc<dyn TrustAnchor>,
        api: Arc<dyn LicenseApi>,
    ) -> Self {
        Self {
            store,
            anchor,
            api,
            clock: Arc::new(SystemClock),
            policy: LicensePolicy::default(),
            instance_name: instance_name(),
        }
    }

    /// Wires the production collaborators described by `config`: the JSON
    /// state file, the OS credential store and the Lemon Squeezy API.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store or HTTP client cannot be opened.
    pub fn from_config(config: &LicenseConfig) -> LicenseResult<Self> {
        let store = FileStore::new(config.state_path());
        let anchor = KeyringAnchor::new(&config.keyring_service, &config.keyring_user)?;
        let api = LemonSqueezyClient::new(config)?;

        Ok(Self::new(Arc::new(store), Arc::new(anchor), Arc::new(api))
            .with_policy(config.policy())
            .with_instance_name(config.resolve_instance_name()))
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the trial and revalidation rules.
    #[must_use]
    pub fn with_policy(mut self, policy: LicensePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the instance name sent on activation.
    #[must_use]
    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    /// The rules in force.
    #[must_use]
    pub fn policy(&self) -> LicensePolicy {
        self.policy
    }

    /// Current time according to the manager's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Loads the license record, reconciles it with the trust anchor, ages the
    /// trial, revalidates an active license when due, and persists any change.
    ///
    /// Network and protocol failures during revalidation are absorbed: the
    /// record is returned unchanged, with its last check left stale so the next
    /// call retries.
    ///
    /// # Errors
    ///
    /// [`LicenseError::CorruptState`] for an unreadable record and
    /// [`LicenseError::Io`] when a change cannot be persisted.
    pub fn check_status(&self) -> LicenseResult<LicenseRecord> {
        let now = self.clock.now();
        let mut record = self.store.load(now)?;

        self.reconcile_install_date(&mut record)?;

        match record.status {
            LicenseStatus::Active => self.revalidate(record, now),
            LicenseStatus::Trial => self.age_trial(record, now),
            LicenseStatus::Expired => Ok(record),
        }
    }

    /// Runs [`check_status`](Self::check_status) and condenses the result
    /// for display.
    ///
    /// # Errors
    ///
    /// Same as [`check_status`](Self::check_status).
    pub fn snapshot(&self) -> LicenseResult<LicenseSnapshot> {
        let record = self.check_status()?;
        Ok(LicenseSnapshot::from_record(
            &record,
            self.clock.now(),
            self.policy.trial_days,
        ))
    }

    /// Activates `key` with the licensing server and, on success, stores the
    /// license as active. The only way out of `Expired`.
    ///
    /// The stored record is left untouched on any failure.
    ///
    /// # Errors
    ///
    /// [`LicenseError::ActivationRejected`] when the server (or an empty key)
    /// is refused, [`LicenseError::Network`] / [`LicenseError::Protocol`] when
    /// the server cannot be consulted, plus the store errors of
    /// [`check_status`](Self::check_status).
    pub fn activate_license(&self, key: &str) -> LicenseResult<LicenseRecord> {
        let key = key.trim();
        if key.is_empty() {
            return Err(LicenseError::ActivationRejected(
                "license key is empty".to_string(),
            ));
        }

        let mut record = self.store.load(self.clock.now())?;

        let receipt = match self.api.activate(key, &self.instance_name) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Activation of {} failed: {e}", mask_key(key).unwrap_or_default());
                return Err(e);
            }
        };

        record.status = LicenseStatus::Active;
        record.license_key = key.to_string();
        record.instance_id = receipt.instance_id;
        record.last_check = self.clock.now();
        self.store.save(&record)?;

        info!(
            "License {} activated as instance {:?}",
            mask_key(key).unwrap_or_default(),
            record.instance_id
        );
        Ok(record)
    }

    /// Restores the anchored install date when the local record claims a later
    /// one, and anchors the local date on the very first run.
    fn reconcile_install_date(&self, record: &mut LicenseRecord) -> LicenseResult<()> {
        match self.anchor.install_date() {
            Ok(None) => match self.anchor.set_install_date(record.install_date) {
                Ok(()) => info!("Anchored install date {}", record.install_date),
                Err(e) => warn!("Could not anchor install date: {e}"),
            },
            Ok(Some(anchored)) if anchored < record.install_date => {
                warn!(
                    "Local install date {} is later than anchored {}; restoring anchored date",
                    record.install_date, anchored
                );
                record.install_date = anchored;
                self.store.save(record)?;
            }
            Ok(Some(_)) => {}
            Err(e) => warn!("Trust anchor unavailable, install date not reconciled: {e}"),
        }
        Ok(())
    }

    fn revalidate(
        &self,
        mut record: LicenseRecord,
        now: DateTime<Utc>,
    ) -> LicenseResult<LicenseRecord> {
        // A last check in the future means the clock moved back; treat it as due.
        let elapsed = now - record.last_check;
        if elapsed >= Duration::zero() && elapsed < self.policy.revalidate_interval {
            debug!("License checked at {}, revalidation not due", record.last_check);
            return Ok(record);
        }

        match self
            .api
            .validate(&record.license_key, record.instance_id.as_deref())
        {
            Ok(verdict) if verdict.is_active() => {
                record.last_check = now;
                self.store.save(&record)?;
                debug!("License revalidated");
            }
            Ok(verdict) => {
                record.status = LicenseStatus::Expired;
                record.last_check = now;
                self.store.save(&record)?;
                warn!("License no longer honoured by server (status {:?})", verdict.status);
            }
            Err(e) if e.is_transient() => {
                warn!("Revalidation skipped, keeping license active: {e}");
            }
            Err(e) => return Err(e),
        }
        Ok(record)
    }

    fn age_trial(
        &self,
        mut record: LicenseRecord,
        now: DateTime<Utc>,
    ) -> LicenseResult<LicenseRecord> {
        let days = record.days_since_install(now);
        if days > self.policy.trial_days {
            record.status = LicenseStatus::Expired;
            self.store.save(&record)?;
            info!("Trial expired {days} days after install");
        }
        Ok(record)
    }
}

impl std::fmt::Debug for LicenseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseManager")
            .field("policy", &self.policy)
            .field("instance_name", &self.instance_name)
            .finish_non_exhaustive()
    }
}
