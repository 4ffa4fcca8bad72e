//! Error types for storage and snapshots

use roster_record::{DecodeError, Fingerprint};
use std::path::PathBuf;

/// Errors reading or writing an artifact
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Artifact changed since it was read (optimistic concurrency failure)
    #[error("conflict writing {location}: artifact is no longer at {expected}")]
    Conflict {
        location: String,
        expected: Fingerprint,
    },

    /// Timeout or connectivity failure; safe to retry
    #[error("transient failure on {location}: {message}")]
    Transient { location: String, message: String },

    /// Remote store refused the request
    #[error("remote store returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact content is not a valid collection
    #[error("failed to decode {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to encode collection: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transient(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Transient {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Conflict and transient failures may succeed on a fresh attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Transient { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors writing or reading snapshots
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot not found: {0}")]
    NotFound(String),

    #[error("no free snapshot name for {0}")]
    Exhausted(String),
}
