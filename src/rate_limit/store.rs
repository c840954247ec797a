//! Quota file persistence.
//!
//! One JSON document, top-level keys are backend ids:
//! ```text
//! { "claude": { "last_request": 1700000000.0, "minute_count": 3,
//!               "minute_start": 1699999990.0, "daily_count": 41,
//!               "day_start": 1699950000.0 }, ... }
//! ```
//! A missing or corrupt file reads as empty. Writes are read-modify-write
//! (other backends' entries are preserved) and replace the file atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::rate_limit::state::QuotaState;
use crate::rate_limit::QuotaError;

/// Entries of the quota file keyed by backend id.
pub type QuotaFile = BTreeMap<String, QuotaState>;

/// Shared quota file. One instance is shared by every backend's limiter.
#[derive(Debug)]
pub struct QuotaStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl QuotaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry. Never fails: problems are logged and read as empty.
    pub fn load(&self) -> QuotaFile {
        read_quota_file(&self.path)
    }

    /// Counters stored for one backend, or fresh counters.
    pub fn load_entry(&self, backend_id: &str) -> QuotaState {
        self.load().remove(backend_id).unwrap_or_default()
    }

    /// Write one backend's entry, keeping every other entry.
    pub async fn save_entry(&self, backend_id: &str, state: &QuotaState) -> Result<(), QuotaError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = match tokio::fs::read(&self.path).await {
            Ok(bytes) => parse_or_empty(&self.path, &bytes),
            Err(_) => QuotaFile::new(),
        };
        entries.insert(backend_id.to_string(), *state);

        let bytes = serde_json::to_vec_pretty(&entries)?;
        write_atomically(&self.path, &bytes).await?;
        Ok(())
    }
}

fn read_quota_file(path: &Path) -> QuotaFile {
    match std::fs::read(path) {
        Ok(bytes) => parse_or_empty(path, &bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => QuotaFile::new(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Quota file unreadable, starting empty");
            QuotaFile::new()
        }
    }
}

fn parse_or_empty(path: &Path, bytes: &[u8]) -> QuotaFile {
    match serde_json::from_slice(bytes) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Quota file corrupt, treating as empty");
            QuotaFile::new()
        }
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e);
    }
    Ok(())
}
