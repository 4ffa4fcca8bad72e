//! Local filesystem backend
//!
//! Writes go to a temp file in the target directory, are fsynced, then
//! renamed over the artifact. The current file hash is compared with the
//! expected fingerprint before the rename.

use crate::backend::{ArtifactState, StorageBackend};
use crate::error::StoreError;
use async_trait::async_trait;
use roster_record::Fingerprint;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Backend for a JSON artifact on local disk
#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn read(&self) -> Result<ArtifactState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => {
                let fingerprint = Fingerprint::of_content(&content);
                tracing::debug!(path = %self.path.display(), fingerprint = fingerprint.short(), "read artifact");
                Ok(ArtifactState::present(content, fingerprint))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ArtifactState::absent()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    async fn write(
        &self,
        content: &[u8],
        expected: &Fingerprint,
        _message: &str,
    ) -> Result<Fingerprint, StoreError> {
        let path = self.path.clone();
        let content = content.to_vec();
        let expected = expected.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &content, &expected))
            .await
            .map_err(|e| StoreError::io(&self.path, io::Error::other(e)))?
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

fn current_fingerprint(path: &Path) -> Result<Fingerprint, StoreError> {
    match std::fs::read(path) {
        Ok(content) => Ok(Fingerprint::of_content(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Fingerprint::Absent),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn write_atomic(path: &Path, content: &[u8], expected: &Fingerprint) -> Result<Fingerprint, StoreError> {
    if current_fingerprint(path)? != *expected {
        return Err(StoreError::Conflict {
            location: path.display().to_string(),
            expected: expected.clone(),
        });
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(content)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;

    let fingerprint = Fingerprint::of_content(content);
    tracing::info!(path = %path.display(), fingerprint = fingerprint.short(), bytes = content.len(), "wrote artifact");
    Ok(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("teachers.json"));
        let state = backend.read().await.unwrap();
        assert!(!state.exists());
        assert!(state.fingerprint.is_absent());
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("data/teachers.json"));

        let fp = backend.write(b"[]\n", &Fingerprint::Absent, "init").await.unwrap();
        let state = backend.read().await.unwrap();
        assert_eq!(state.content.as_deref(), Some(&b"[]\n"[..]));
        assert_eq!(state.fingerprint, fp);
    }

    #[tokio::test]
    async fn stale_fingerprint_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("teachers.json"));
        let first = backend.write(b"[1]", &Fingerprint::Absent, "a").await.unwrap();
        backend.write(b"[2]", &first, "b").await.unwrap();

        let err = backend.write(b"[3]", &first, "c").await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(std::fs::read(backend.path()).unwrap(), b"[2]");
    }

    #[tokio::test]
    async fn create_over_existing_file_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teachers.json");
        std::fs::write(&path, b"[]").unwrap();
        let err = LocalBackend::new(&path)
            .write(b"[1]", &Fingerprint::Absent, "x")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("teachers.json"));
        backend.write(b"[]", &Fingerprint::Absent, "x").await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
