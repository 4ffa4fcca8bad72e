//! Typed record store over a byte backend

use crate::backend::StorageBackend;
use crate::error::StoreError;
use roster_record::{Collection, Fingerprint, RecordKind};
use std::marker::PhantomData;

/// A decoded artifact together with the bytes it came from
#[derive(Debug, Clone)]
pub struct Loaded<K: RecordKind> {
    pub collection: Collection<K>,
    pub fingerprint: Fingerprint,
    /// Raw persisted bytes, `None` if the artifact does not exist
    pub raw: Option<Vec<u8>>,
}

/// Store of one record kind
///
/// `read` and `write` exchange whole collections; callers transform one
/// collection value into the next and hand it back with the fingerprint
/// they started from.
pub struct RecordStore<K: RecordKind, B> {
    backend: B,
    _phantom: PhantomData<K>,
}

impl<K: RecordKind, B: StorageBackend> RecordStore<K, B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read the collection and its fingerprint
    ///
    /// A missing artifact reads as an empty collection with
    /// `Fingerprint::Absent`.
    ///
    /// # Errors
    /// Backend failures, or `Decode` if the content is not a collection
    pub async fn read(&self) -> Result<(Collection<K>, Fingerprint), StoreError> {
        let loaded = self.load().await?;
        Ok((loaded.collection, loaded.fingerprint))
    }

    /// Read keeping the raw bytes (for snapshots)
    ///
    /// # Errors
    /// See [`Self::read`]
    pub async fn load(&self) -> Result<Loaded<K>, StoreError> {
        let state = self.backend.read().await?;
        let collection = match &state.content {
            Some(bytes) => Collection::decode(bytes).map_err(|source| StoreError::Decode {
                location: self.backend.describe(),
                source,
            })?,
            None => Collection::default(),
        };
        tracing::debug!(
            kind = K::KIND_ID,
            records = collection.len(),
            fingerprint = state.fingerprint.short(),
            "loaded collection"
        );
        Ok(Loaded {
            collection,
            fingerprint: state.fingerprint,
            raw: state.content,
        })
    }

    /// Write `collection` if the artifact is still at `expected`
    ///
    /// # Errors
    /// `Conflict` on a stale fingerprint, `Encode` if serialization fails,
    /// otherwise backend failures
    pub async fn write(
        &self,
        collection: &Collection<K>,
        expected: &Fingerprint,
        message: &str,
    ) -> Result<Fingerprint, StoreError> {
        let bytes = collection.encode()?;
        self.backend.write(&bytes, expected, message).await
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.backend.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalBackend;
    use pretty_assertions::assert_eq;
    use roster_record::{Person, PersonRecord, Role};

    #[tokio::test]
    async fn missing_artifact_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::<Person, _>::new(LocalBackend::new(dir.path().join("t.json")));
        let (people, fp) = store.read().await.unwrap();
        assert!(people.is_empty());
        assert!(fp.is_absent());
    }

    #[tokio::test]
    async fn write_read_keeps_order_and_roles() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::<Person, _>::new(LocalBackend::new(dir.path().join("t.json")));
        let people = Collection::<Person>::new(vec![
            PersonRecord::new("b_001", "乙").with_role(Role::new("声乐组", "声乐教师", 2)),
            PersonRecord::new("a_001", "甲"),
        ]);

        let fp = store.write(&people, &Fingerprint::Absent, "init").await.unwrap();
        let (read, read_fp) = store.read().await.unwrap();
        assert_eq!(read, people);
        assert_eq!(read_fp, fp);
    }

    #[tokio::test]
    async fn undecodable_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, b"{\"not\": \"an array\"}").unwrap();
        let store = RecordStore::<Person, _>::new(LocalBackend::new(path));
        assert!(matches!(store.read().await, Err(StoreError::Decode { .. })));
    }
}
