//! Error types for roster operations
//!
//! Fatal kinds abort the whole mutation before anything is written.
//! Warnings are never errors; they travel with the successful outcome.

use roster_merge::{ImportError, Report};
use roster_record::{AllocationError, Fingerprint, Identity};
use roster_store::{BackupError, StoreError};
use std::path::PathBuf;

/// Main roster error type
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// Proposed state has fatal findings
    #[error("validation failed: {0}")]
    Validation(Report),

    /// Identifier sequence is corrupt
    #[error("identity allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    /// Snapshot could not be written; nothing was committed
    #[error("backup failed, mutation aborted: {0}")]
    Backup(#[from] BackupError),

    /// Artifact changed since it was read
    #[error("conflict on {location}: artifact moved on from {expected}; re-read and resubmit")]
    Conflict {
        location: String,
        expected: Fingerprint,
    },

    /// Timeout or connectivity failure to the store
    #[error("transient store failure on {location}: {message}")]
    Transient { location: String, message: String },

    #[error("no record matches {0}")]
    NotFound(Identity),

    /// 1-based role index outside the person's role list
    #[error("{identity} has {len} role(s); no role #{index}")]
    RoleIndexOutOfRange {
        identity: Identity,
        index: usize,
        len: usize,
    },

    /// Role named for a department ranking belongs to another department
    #[error("role #{index} of {identity} is not in {department}")]
    RoleNotInDepartment {
        identity: Identity,
        index: usize,
        department: String,
    },

    /// 1-based admission index outside the student's admission list
    #[error("{identity} has {len} admission(s); no admission #{index}")]
    AdmissionIndexOutOfRange {
        identity: Identity,
        index: usize,
        len: usize,
    },

    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<StoreError> for RosterError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { location, expected } => Self::Conflict { location, expected },
            StoreError::Transient { location, message } => Self::Transient { location, message },
            other => Self::Store(other),
        }
    }
}

impl RosterError {
    /// Caller may re-read and try again
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Transient { .. })
    }

    /// Rejected because of the proposed content itself
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Validation report, if this is a validation failure
    #[must_use]
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Validation(report) => Some(report),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to read import source: {0}")]
    Source(String),
}
