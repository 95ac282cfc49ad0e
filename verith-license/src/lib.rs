//! License lifecycle enforcement for Verith.
//!
//! This module handles:
//! - The 15-day trial and its expiry
//! - Activation of a purchased key with the licensing server
//! - Daily revalidation of an active key, with grace on network failure
//! - Anti-rollback of the install date via the OS credential store
//!
//! # Design Principles
//!
//! - **Offline-tolerant**: an active license never expires because the server
//!   is unreachable; the check is simply retried next time
//! - **No silent resets**: a corrupt state file is an error, never a new trial
//! - **Injectable collaborators**: store, trust anchor, server and clock are
//!   traits, so the state machine runs against in-memory fakes in tests
//!
//! # Usage
//!
//! ```no_run
//! use verith_license::{LicenseConfig, LicenseManager};
//!
//! let manager = LicenseManager::from_config(&LicenseConfig::from_env())?;
//! let record = manager.check_status()?;
//! if !record.status.is_usable() {
//!     manager.activate_license("XXXX-XXXX-XXXX-XXXX")?;
//! }
//! # Ok::<(), verith_license::LicenseError>(())
//! ```

mod anchor;
mod client;
mod clock;
mod config;
mod error;
mod instance;
mod manager;
mod record;
mod store;

pub use anchor::{KeyringAnchor, MemoryAnchor, TrustAnchor};
pub use client::{
    ActivateResponse, ActivationReceipt, LemonSqueezyClient, LicenseApi, RemoteInstance,
    RemoteLicenseKey, RemoteLicenseStatus, ValidateResponse, ValidationVerdict,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_API_BASE_URL, FALLBACK_INSTANCE_NAME, LicenseConfig, LicensePolicy};
pub use error::{LicenseError, LicenseResult};
pub use instance::instance_name;
pub use manager::LicenseManager;
pub use record::{LicenseRecord, LicenseSnapshot, LicenseStatus, TRIAL_DAYS};
pub use store::{FileStore, LicenseStore, MemoryStore};
