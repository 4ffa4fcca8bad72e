//! Storage backend capability set
//!
//! Backends move opaque bytes plus a [`Fingerprint`]; typing happens in
//! [`crate::RecordStore`]. Every write is conditional on the fingerprint the
//! caller last read.

use crate::error::StoreError;
use async_trait::async_trait;
use roster_record::Fingerprint;
use std::sync::Arc;
use std::time::Duration;

/// Current content of an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactState {
    /// `None` when the artifact does not exist yet
    pub content: Option<Vec<u8>>,
    pub fingerprint: Fingerprint,
}

impl ArtifactState {
    #[inline]
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn present(content: Vec<u8>, fingerprint: Fingerprint) -> Self {
        Self {
            content: Some(content),
            fingerprint,
        }
    }

    #[inline]
    #[must_use]
    pub fn exists(&self) -> bool {
        self.content.is_some()
    }
}

/// Read/write access to one persisted artifact
///
/// # Contract
/// - `write` fails with [`StoreError::Conflict`] when `expected` does not
///   match the current state; nothing is written in that case
/// - `Fingerprint::Absent` as `expected` means "create; must not exist"
/// - timeouts surface as [`StoreError::Transient`], never as conflicts
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the artifact and its fingerprint
    async fn read(&self) -> Result<ArtifactState, StoreError>;

    /// Replace the artifact if it is still at `expected`
    ///
    /// `message` labels the change (commit message on remote stores).
    async fn write(
        &self,
        content: &[u8],
        expected: &Fingerprint,
        message: &str,
    ) -> Result<Fingerprint, StoreError>;

    /// Human-readable location, for logs and errors
    fn describe(&self) -> String;

    /// Wait up to `within` for work a write left running in the background
    async fn settle(&self, _within: Duration) {}
}

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    async fn read(&self) -> Result<ArtifactState, StoreError> {
        (**self).read().await
    }

    async fn write(
        &self,
        content: &[u8],
        expected: &Fingerprint,
        message: &str,
    ) -> Result<Fingerprint, StoreError> {
        (**self).write(content, expected, message).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn settle(&self, within: Duration) {
        (**self).settle(within).await;
    }
}

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    async fn read(&self) -> Result<ArtifactState, StoreError> {
        (**self).read().await
    }

    async fn write(
        &self,
        content: &[u8],
        expected: &Fingerprint,
        message: &str,
    ) -> Result<Fingerprint, StoreError> {
        (**self).write(content, expected, message).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn settle(&self, within: Duration) {
        (**self).settle(within).await;
    }
}
