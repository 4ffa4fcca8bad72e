//! Record kinds and the ordered record collection
//!
//! A persisted artifact is an ordered JSON array of one record kind. The
//! [`RecordKind`] trait describes what the store needs to know about a kind
//! (identity, required fields, media references, droppable fragments) so
//! people and students run through the same pipeline.
//! This is a sealed trait - only kinds defined within this crate implement it.

use crate::identity::Identity;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Trait for record kinds
///
/// # Contract
/// - `id` and `name` return the raw stored values (possibly empty)
/// - `sanitize` removes exactly the parts `incomplete_parts` reports
/// - `KIND_ID` is stable and used in log lines and snapshot labels
pub trait RecordKind: Send + Sync + 'static + Debug + private::Sealed {
    /// The record type stored in the collection
    type Record: Send + Sync + 'static + Debug + Clone + PartialEq + Serialize + DeserializeOwned;

    /// Kind identifier
    const KIND_ID: &'static str;

    /// Record identifier
    fn id(record: &Self::Record) -> &str;

    /// Display name
    fn name(record: &Self::Record) -> &str;

    /// Required fields that are blank on `record`
    ///
    /// Default implementation checks `id` and `name`.
    fn missing_fields(record: &Self::Record) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if Self::id(record).trim().is_empty() {
            missing.push("id");
        }
        if Self::name(record).trim().is_empty() {
            missing.push("name");
        }
        missing
    }

    /// Media files referenced by `record`
    fn media_refs(record: &Self::Record) -> Vec<MediaRef<'_>>;

    /// Sub-entries that cannot be persisted as they are
    fn incomplete_parts(record: &Self::Record) -> Vec<IncompletePart>;

    /// Drop incomplete sub-entries and normalize media paths, returning what
    /// was dropped
    fn sanitize(record: &mut Self::Record) -> Vec<IncompletePart>;

    /// Decode a persisted artifact
    ///
    /// # Errors
    /// Returns error if the bytes are not a JSON array of records
    fn decode(bytes: &[u8]) -> Result<Vec<Self::Record>, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Sealed trait - prevents external implementations
#[doc(hidden)]
pub mod private {
    /// Sealed trait marker
    pub trait Sealed {}
}

/// A media reference on a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef<'a> {
    /// Field label, e.g. `photo` or `admissions[1].image`
    pub field: String,
    /// Raw stored path
    pub path: &'a str,
}

/// A sub-entry (role, admission) that is dropped instead of persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompletePart {
    /// Owning list, e.g. `roles`
    pub field: &'static str,
    /// Zero-based position in that list
    pub index: usize,
    pub reason: String,
}

/// Errors decoding a persisted artifact
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("artifact top level must be an array")]
    NotAnArray,

    #[error("element {index} is not an object")]
    NotAnObject { index: usize },
}

/// Ordered collection of records of one kind
///
/// # Invariants
/// - Insertion order is the persisted order
/// - Values are never shared: operations clone, transform and hand back a
///   new collection
#[derive(Debug)]
pub struct Collection<K: RecordKind> {
    records: Vec<K::Record>,
    _phantom: PhantomData<K>,
}

impl<K: RecordKind> Clone for Collection<K> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<K: RecordKind> PartialEq for Collection<K> {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<K: RecordKind> Default for Collection<K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<K: RecordKind> Collection<K> {
    #[inline]
    #[must_use]
    pub fn new(records: Vec<K::Record>) -> Self {
        Self {
            records,
            _phantom: PhantomData,
        }
    }

    /// Decode from persisted bytes
    ///
    /// # Errors
    /// Returns error if the artifact cannot be decoded
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        K::decode(bytes).map(Self::new)
    }

    /// Encode as pretty-printed JSON with a trailing newline
    ///
    /// # Errors
    /// Returns error if a record fails to serialize
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(&self.records)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    #[inline]
    #[must_use]
    pub fn records(&self) -> &[K::Record] {
        &self.records
    }

    #[inline]
    pub fn records_mut(&mut self) -> &mut Vec<K::Record> {
        &mut self.records
    }

    #[inline]
    #[must_use]
    pub fn into_records(self) -> Vec<K::Record> {
        self.records
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K::Record> {
        self.records.iter()
    }

    /// All stored identifiers, in order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(K::id)
    }

    /// Position of the first record matching `identity`
    #[must_use]
    pub fn position(&self, identity: &Identity) -> Option<usize> {
        self.records.iter().position(|r| match identity {
            Identity::Id(id) => K::id(r) == id,
            Identity::Name(name) => K::name(r) == name,
        })
    }

    /// First record matching `identity`
    #[must_use]
    pub fn get(&self, identity: &Identity) -> Option<&K::Record> {
        self.position(identity).map(|i| &self.records[i])
    }

    /// Whether any record carries `id`
    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.ids().any(|existing| existing == id)
    }

    #[inline]
    pub fn push(&mut self, record: K::Record) {
        self.records.push(record);
    }
}
