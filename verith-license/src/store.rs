//! Durable storage for the license record.
//!
//! The file store writes a complete new file next to the old one and renames
//! it into place, so a concurrent reader sees either the old record or the
//! new one, never half of each.

use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseRecord;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Storage for the single license record of this installation.
pub trait LicenseStore: Send + Sync {
    /// Returns the stored record, creating and persisting a fresh trial
    /// starting at `now` when none exists yet.
    ///
    /// # Errors
    ///
    /// [`LicenseError::CorruptState`] when a record exists but cannot be
    /// decoded, [`LicenseError::Io`] when it cannot be read or created.
    fn load(&self, now: DateTime<Utc>) -> LicenseResult<LicenseRecord>;

    /// Replaces the stored record.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Io`] when the record cannot be written.
    fn save(&self, record: &LicenseRecord) -> LicenseResult<()>;
}

/// JSON file store under an application-private directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store backed by the file at `path`. Nothing is touched on disk
    /// until the first load or save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn decode(&self, bytes: &[u8]) -> LicenseResult<LicenseRecord> {
        serde_json::from_slice(bytes).map_err(|e| {
            LicenseError::CorruptState(format!("{}: {e}", self.path.display()))
        })
    }
}

impl LicenseStore for FileStore {
    fn load(&self, now: DateTime<Utc>) -> LicenseResult<LicenseRecord> {
        match fs::read(&self.path) {
            Ok(bytes) => self.decode(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let record = LicenseRecord::new_trial(now);
                self.save(&record)?;
                info!("Started new trial, state file created at {}", self.path.display());
                Ok(record)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_private_dir(&dir)?;

        let bytes = serde_json::to_vec_pretty(record)?;

        // NamedTempFile is created with owner-only permissions on Unix.
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!("License state saved ({})", record.status);
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

/// In-memory store.
///
/// Useful for testing, or for hosts that keep license state elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    record: Option<LicenseRecord>,
    corrupt: bool,
    fail_saves: bool,
    saves: usize,
}

impl MemoryStore {
    /// Creates an empty store (the first load starts a trial).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `record`.
    #[must_use]
    pub fn with_record(record: LicenseRecord) -> Self {
        let store = Self::new();
        store.lock().record = Some(record);
        store
    }

    /// Returns the stored record without creating one.
    #[must_use]
    pub fn record(&self) -> Option<LicenseRecord> {
        self.lock().record.clone()
    }

    /// Replaces the stored record directly, bypassing the save counter.
    pub fn put(&self, record: LicenseRecord) {
        self.lock().record = Some(record);
    }

    /// Drops the stored record, as if the state file had been deleted.
    pub fn clear(&self) {
        self.lock().record = None;
    }

    /// Makes every subsequent load fail as corrupt.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.lock().corrupt = corrupt;
    }

    /// Makes every subsequent save fail with an IO error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LicenseStore for MemoryStore {
    fn load(&self, now: DateTime<Utc>) -> LicenseResult<LicenseRecord> {
        let mut state = self.lock();
        if state.corrupt {
            return Err(LicenseError::CorruptState(
                "in-memory record marked corrupt".to_string(),
            ));
        }
        if let Some(record) = &state.record {
            return Ok(record.clone());
        }
        if state.fail_saves {
            return Err(LicenseError::Io(std::io::Error::other("in-memory save failure")));
        }
        let record = LicenseRecord::new_trial(now);
        state.record = Some(record.clone());
        state.saves += 1;
        Ok(record)
    }

    fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(LicenseError::Io(std::io::Error::other("in-memory save failure")));
        }
        state.record = Some(record.clone());
        state.saves += 1;
        Ok(())
    }
}
