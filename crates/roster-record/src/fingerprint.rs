//! Content hashing and opaque fingerprints
//!
//! [`ContentHash`] is the Blake3 digest used for local artifacts.
//! [`Fingerprint`] is what the storage layer hands back from a read and
//! expects back on a write; its digest is opaque to callers (a Blake3 hex
//! string locally, a blob SHA on a remote store).

use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Identifies the exact content state of a persisted artifact
///
/// Returned by every read and required by every write. A write whose
/// expected fingerprint no longer matches the stored state is a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Fingerprint {
    /// The artifact does not exist yet
    #[default]
    Absent,
    /// Digest of the current content
    Digest(String),
}

impl Fingerprint {
    /// Fingerprint of local content (Blake3 hex)
    #[must_use]
    pub fn of_content(data: &[u8]) -> Self {
        Self::Digest(ContentHash::compute(data).to_string())
    }

    /// Wrap a digest issued by a remote store
    #[must_use]
    pub fn digest(value: impl Into<String>) -> Self {
        Self::Digest(value.into())
    }

    #[inline]
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Digest string, `None` when absent
    #[must_use]
    pub fn as_digest(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::Digest(d) => Some(d),
        }
    }

    /// First 12 characters, for log lines
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Absent => "absent",
            Self::Digest(d) => d.get(..12).unwrap_or(d),
        }
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("<absent>"),
            Self::Digest(d) => f.write_str(d),
        }
    }
}
