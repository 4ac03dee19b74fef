//! Storage error types.
//!
//! Persistence failures are never fatal: the store logs them and keeps
//! serving from memory for the rest of the session. These types exist so
//! backends can report what went wrong with a specific slot.

use thiserror::Error;

/// Errors that can occur while reading or writing a storage slot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The slot could not be read.
    #[error("failed to read slot '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The slot could not be written.
    #[error("failed to write slot '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The slot held text that did not parse as the expected JSON shape.
    #[error("slot '{key}' holds corrupt JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Returns the key of the slot this error refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::Read { key, .. } | Self::Write { key, .. } | Self::Corrupt { key, .. } => key,
        }
    }

    /// Returns true if the slot content was unreadable as JSON.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
