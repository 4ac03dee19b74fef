//! Storage backends for the local store.
//!
//! The store persists three independent JSON slots through the
//! [`StorageBackend`] trait:
//! - [`FileBackend`] writes one file per slot under the app data directory.
//! - [`MemoryBackend`] keeps slots in a map and can inject failures, for
//!   tests and for consumers that want a throwaway store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::StorageError;

/// Keyed string-slot storage, the shape of the browser storage the original
/// app persisted to.
pub trait StorageBackend: Send {
    /// Reads a slot. `Ok(None)` means the slot has never been written.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a slot, replacing any previous value.
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ============================================================================
// FileBackend
// ============================================================================

/// File-per-slot backend. A slot named `planthesia_tasks` lives at
/// `<dir>/planthesia_tasks.json`.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at the default data directory.
    ///
    /// The directory is resolved in order:
    /// 1. `PLANTHESIA_DATA_DIR` environment variable.
    /// 2. `<platform data dir>/planthesia` (e.g. `~/.local/share/planthesia`).
    /// 3. The current directory as a last resort.
    pub fn new() -> Self {
        let dir = std::env::var("PLANTHESIA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
                p.push("planthesia");
                p
            });
        Self { dir }
    }

    /// Creates a backend rooted at an explicit directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory slots are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| StorageError::Read {
                key: key.to_string(),
                source,
            })
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Write {
            key: key.to_string(),
            source,
        })?;
        fs::write(self.slot_path(key), value).map_err(|source| StorageError::Write {
            key: key.to_string(),
            source,
        })
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory backend with failure injection.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: HashMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent read fail, simulating unavailable storage.
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Makes every subsequent write fail, simulating quota exhaustion.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Seeds a slot with raw text, bypassing failure injection.
    pub fn seed(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.slots.insert(key.into(), value.into());
    }

    /// Returns the raw text of a slot, if written.
    pub fn slot(&self, key: &str) -> Option<&str> {
        self.slots.get(key).map(String::as_str)
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads {
            return Err(StorageError::Read {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "storage unavailable"),
            });
        }
        Ok(self.slots.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Write {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded"),
            });
        }
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
