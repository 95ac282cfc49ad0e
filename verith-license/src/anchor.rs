//! Secondary record of the install date, kept outside the data directory.
//!
//! Deleting the license state file brings back a fresh trial record. The
//! install date kept here survives that deletion, so the manager can restore
//! the original date.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Mutex;
use tracing::debug;

/// Independent store of the original install date.
///
/// Writes never move a recorded date later: once a date is recorded, only an
/// earlier one may replace it.
pub trait TrustAnchor: Send + Sync {
    /// Returns the recorded install date, or `None` if nothing was recorded.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Anchor`] when the backing store fails or holds a value
    /// that is not a date.
    fn install_date(&self) -> LicenseResult<Option<DateTime<Utc>>>;

    /// Records `at` as the install date unless an equal or earlier date is
    /// already recorded.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Anchor`] when the backing store fails.
    fn set_install_date(&self, at: DateTime<Utc>) -> LicenseResult<()>;
}

/// Trust anchor backed by the OS credential store
/// (Keychain, Windows Credential Manager, Secret Service on Linux).
#[derive(Debug)]
pub struct KeyringAnchor {
    service: String,
    user: String,
    entry: keyring::Entry,
}

impl KeyringAnchor {
    /// Opens the credential entry `service`/`user`.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Anchor`] if the platform credential store is unusable.
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> LicenseResult<Self> {
        let service = service.into();
        let user = user.into();
        let entry = keyring::Entry::new(&service, &user)
            .map_err(|e| LicenseError::Anchor(e.to_string()))?;
        Ok(Self {
            service,
            user,
            entry,
        })
    }
}

impl TrustAnchor for KeyringAnchor {
    fn install_date(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        let raw = match self.entry.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(LicenseError::Anchor(e.to_string())),
        };
        parse_install_date(&raw).map(Some)
    }

    fn set_install_date(&self, at: DateTime<Utc>) -> LicenseResult<()> {
        // An unreadable value is overwritten; a readable one only by an earlier date.
        if let Ok(Some(existing)) = self.install_date() {
            if existing <= at {
                return Ok(());
            }
        }
        self.entry
            .set_password(&format_install_date(at))
            .map_err(|e| LicenseError::Anchor(e.to_string()))?;
        debug!("Install date anchored in credential store {}/{}", self.service, self.user);
        Ok(())
    }
}

/// RFC 3339 with full precision, so the anchored date compares equal to the
/// record it was copied from.
fn format_install_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_install_date(raw: &str) -> LicenseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LicenseError::Anchor(format!("stored install date is not a date: {e}")))
}

/// In-memory trust anchor, for tests and for hosts without a credential store.
#[derive(Debug, Default)]
pub struct MemoryAnchor {
    date: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryAnchor {
    /// Creates an anchor with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an anchor that already records `at`.
    #[must_use]
    pub fn with_date(at: DateTime<Utc>) -> Self {
        Self {
            date: Mutex::new(Some(at)),
        }
    }
}

impl TrustAnchor for MemoryAnchor {
    fn install_date(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        Ok(*self.date.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn set_install_date(&self, at: DateTime<Utc>) -> LicenseResult<()> {
        let mut date = self.date.lock().unwrap_or_else(|e| e.into_inner());
        match *date {
            Some(existing) if existing <= at => {}
            _ => *date = Some(at),
        }
        Ok(())
    }
}
