//! Record identities and sequence allocation
//!
//! Identifiers are `<category-prefix>_<sequence>`, zero-padded to at least
//! three digits (`vocal_001`). Allocation is a pure function of the ids
//! already present; nothing is reserved until the caller persists.

use std::fmt::{self, Display, Formatter};

/// Minimum zero-padded width of an allocated sequence
const MIN_SEQUENCE_WIDTH: usize = 3;

/// How an operation addresses a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Exact identifier
    Id(String),
    /// Exact display name (first match wins)
    Name(String),
}

impl Identity {
    #[inline]
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    #[inline]
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::Name(name) => write!(f, "name={name}"),
        }
    }
}

/// Errors allocating a new identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// An existing identifier with the prefix has a non-numeric suffix
    #[error("corrupt identifier sequence: '{id}' has a non-numeric suffix for prefix '{prefix}'")]
    CorruptSequence { prefix: String, id: String },

    /// Prefix is empty or has characters outside `[A-Za-z0-9_-]`
    #[error("invalid category prefix: '{0}'")]
    InvalidPrefix(String),

    /// Sequence space exhausted
    #[error("identifier sequence overflow for prefix '{0}'")]
    Overflow(String),
}

/// Sequence allocator for one category prefix
///
/// Built by scanning existing identifiers; hands out consecutive sequences
/// so several new records can be created in a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAllocator {
    prefix: String,
    next: u64,
    width: usize,
}

impl IdentityAllocator {
    /// Scan `existing` ids that start with `<prefix>_`
    ///
    /// # Errors
    /// - `InvalidPrefix` if the prefix is malformed
    /// - `CorruptSequence` if a matching id has a non-numeric suffix
    pub fn scan<'a, I>(prefix: &str, existing: I) -> Result<Self, AllocationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        validate_prefix(prefix)?;
        let head = format!("{prefix}_");

        let mut max = 0u64;
        let mut width = MIN_SEQUENCE_WIDTH;
        for id in existing {
            let Some(suffix) = id.strip_prefix(&head) else {
                continue;
            };
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AllocationError::CorruptSequence {
                    prefix: prefix.to_string(),
                    id: id.to_string(),
                });
            }
            let seq: u64 = suffix
                .parse()
                .map_err(|_| AllocationError::CorruptSequence {
                    prefix: prefix.to_string(),
                    id: id.to_string(),
                })?;
            max = max.max(seq);
            width = width.max(suffix.len());
        }

        let next = max
            .checked_add(1)
            .ok_or_else(|| AllocationError::Overflow(prefix.to_string()))?;
        Ok(Self {
            prefix: prefix.to_string(),
            next,
            width,
        })
    }

    /// Hand out the next identifier
    ///
    /// # Errors
    /// Returns `Overflow` when the sequence cannot advance
    pub fn next_id(&mut self) -> Result<String, AllocationError> {
        let id = format!("{}_{:0width$}", self.prefix, self.next, width = self.width);
        self.next = self
            .next
            .checked_add(1)
            .ok_or_else(|| AllocationError::Overflow(self.prefix.clone()))?;
        Ok(id)
    }
}

/// Allocate one identifier not present in `existing`
///
/// # Errors
/// See [`IdentityAllocator::scan`]
pub fn allocate<'a, I>(prefix: &str, existing: I) -> Result<String, AllocationError>
where
    I: IntoIterator<Item = &'a str>,
{
    IdentityAllocator::scan(prefix, existing)?.next_id()
}

fn validate_prefix(prefix: &str) -> Result<(), AllocationError> {
    let valid = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AllocationError::InvalidPrefix(prefix.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_continues_existing_sequence() {
        let existing: Vec<String> = (1..=22).map(|n| format!("vocal_{n:03}")).collect();
        let id = allocate("vocal", existing.iter().map(String::as_str)).unwrap();
        assert_eq!(id, "vocal_023");
    }

    #[test]
    fn allocate_starts_at_one() {
        assert_eq!(allocate("admin", []).unwrap(), "admin_001");
    }

    #[test]
    fn allocate_ignores_other_prefixes() {
        let existing = ["vocal_009", "vocalist_500", "dance_100", "chen_tao"];
        assert_eq!(allocate("vocal", existing).unwrap(), "vocal_010");
    }

    #[test]
    fn allocate_keeps_wider_width() {
        let existing = ["s_0042", "s_7"];
        assert_eq!(allocate("s", existing).unwrap(), "s_0043");
    }

    #[test]
    fn allocate_rejects_corrupt_suffix() {
        let err = allocate("vocal", ["vocal_001", "vocal_lead"]).unwrap_err();
        assert_eq!(
            err,
            AllocationError::CorruptSequence {
                prefix: "vocal".to_string(),
                id: "vocal_lead".to_string()
            }
        );
        assert!(matches!(
            allocate("vocal", ["vocal_"]),
            Err(AllocationError::CorruptSequence { .. })
        ));
    }

    #[test]
    fn allocate_rejects_bad_prefix() {
        assert!(matches!(allocate("", []), Err(AllocationError::InvalidPrefix(_))));
        assert!(matches!(allocate("a b", []), Err(AllocationError::InvalidPrefix(_))));
    }

    #[test]
    fn allocator_hands_out_consecutive_ids() {
        let mut allocator = IdentityAllocator::scan("dance", ["dance_004"]).unwrap();
        let ids: Vec<String> = (0..3).map(|_| allocator.next_id().unwrap()).collect();
        assert_eq!(ids, vec!["dance_005", "dance_006", "dance_007"]);
    }

    #[test]
    fn identity_display() {
        assert_eq!(Identity::id("a_001").to_string(), "id=a_001");
        assert_eq!(Identity::name("王玉").to_string(), "name=王玉");
    }
}
