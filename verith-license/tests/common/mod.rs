#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use verith_license::{
    ActivationReceipt, LicenseApi, LicenseError, LicenseManager, LicensePolicy, LicenseRecord,
    LicenseResult, LicenseStatus, ManualClock, MemoryAnchor, MemoryStore, RemoteLicenseStatus,
    ValidationVerdict,
};

/// A fixed "now" so expectations do not depend on the wall clock.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
}

/// What the fake server answers to validate calls.
#[derive(Debug, Clone)]
pub enum ValidateReply {
    Active,
    Status(RemoteLicenseStatus),
    Timeout,
    Garbled,
}

/// What the fake server answers to activate calls.
#[derive(Debug, Clone)]
pub enum ActivateReply {
    Ok { instance_id: Option<String> },
    Rejected(String),
    Timeout,
    Garbled,
}

/// Scripted licensing server that counts calls.
#[derive(Debug, Default)]
pub struct FakeApi {
    validate_replies: Mutex<VecDeque<ValidateReply>>,
    activate_replies: Mutex<VecDeque<ActivateReply>>,
    pub validate_calls: AtomicUsize,
    pub activate_calls: AtomicUsize,
    pub last_activation: Mutex<Option<(String, String)>>,
    pub last_validation: Mutex<Option<(String, Option<String>)>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_validate(&self, reply: ValidateReply) {
        self.validate_replies.lock().unwrap().push_back(reply);
    }

    pub fn on_activate(&self, reply: ActivateReply) {
        self.activate_replies.lock().unwrap().push_back(reply);
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn activate_calls(&self) -> usize {
        self.activate_calls.load(Ordering::SeqCst)
    }
}

impl LicenseApi for FakeApi {
    fn activate(&self, key: &str, instance_name: &str) -> LicenseResult<ActivationReceipt> {
        self.activate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_activation.lock().unwrap() = Some((key.to_string(), instance_name.to_string()));
        let reply = self
            .activate_replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected activate call");
        match reply {
            ActivateReply::Ok { instance_id } => Ok(ActivationReceipt {
                instance_id,
                status: Some(RemoteLicenseStatus::Active),
            }),
            ActivateReply::Rejected(message) => Err(LicenseError::ActivationRejected(message)),
            ActivateReply::Timeout => Err(LicenseError::Network("request timed out".into())),
            ActivateReply::Garbled => Err(LicenseError::Protocol("not json".into())),
        }
    }

    fn validate(&self, key: &str, instance_id: Option<&str>) -> LicenseResult<ValidationVerdict> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_validation.lock().unwrap() =
            Some((key.to_string(), instance_id.map(str::to_string)));
        let reply = self
            .validate_replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected validate call");
        match reply {
            ValidateReply::Active => Ok(ValidationVerdict {
                valid: true,
                status: RemoteLicenseStatus::Active,
            }),
            ValidateReply::Status(status) => Ok(ValidationVerdict {
                valid: false,
                status,
            }),
            ValidateReply::Timeout => Err(LicenseError::Network("request timed out".into())),
            ValidateReply::Garbled => Err(LicenseError::Protocol("not json".into())),
        }
    }
}

/// A manager wired to in-memory collaborators, with handles kept for inspection.
pub struct Harness {
    pub manager: LicenseManager,
    pub store: Arc<MemoryStore>,
    pub anchor: Arc<MemoryAnchor>,
    pub api: Arc<FakeApi>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(store: MemoryStore, anchor: MemoryAnchor) -> Self {
        let store = Arc::new(store);
        let anchor = Arc::new(anchor);
        let api = FakeApi::new();
        let clock = Arc::new(ManualClock::new(t0()));
        let manager = LicenseManager::new(store.clone(), anchor.clone(), api.clone())
            .with_clock(clock.clone())
            .with_policy(LicensePolicy::default())
            .with_instance_name("test-desk");
        Self {
            manager,
            store,
            anchor,
            api,
            clock,
        }
    }

    /// Fresh install: nothing in the store, nothing anchored.
    pub fn fresh() -> Self {
        Self::new(MemoryStore::new(), MemoryAnchor::new())
    }

    /// Existing record, anchored at the record's own install date.
    pub fn with_record(record: LicenseRecord) -> Self {
        let anchor = MemoryAnchor::with_date(record.install_date);
        Self::new(MemoryStore::with_record(record), anchor)
    }

    pub fn stored(&self) -> LicenseRecord {
        self.store.record().expect("record stored")
    }
}

pub fn trial_installed_days_ago(days: i64) -> LicenseRecord {
    let install = t0() - Duration::days(days);
    LicenseRecord {
        install_date: install,
        license_key: String::new(),
        instance_id: None,
        status: LicenseStatus::Trial,
        last_check: install,
    }
}

pub fn active_checked_hours_ago(hours: i64) -> LicenseRecord {
    LicenseRecord {
        install_date: t0() - Duration::days(40),
        license_key: "GOOD-KEY".to_string(),
        instance_id: Some("inst-7".to_string()),
        status: LicenseStatus::Active,
        last_check: t0() - Duration::hours(hours),
    }
}
