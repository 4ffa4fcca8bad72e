//! Pre-write snapshots
//!
//! A snapshot is a full copy of an artifact taken before it is replaced.
//! The store is append-only and independent of the storage backend, so local
//! and remote artifacts share one backup location.
//!
//! Filesystem snapshots are named `<label>.bak.<YYYYmmddHHMMSS>`, with a
//! `-N` suffix when a name is already taken within the same second.

use crate::error::BackupError;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const MAX_SAME_SECOND: u32 = 1000;

/// A stored snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Stable identifier, usable with [`SnapshotStore::load`]
    pub id: String,
    /// Artifact label the snapshot belongs to
    pub label: String,
    pub taken_at: NaiveDateTime,
    /// Collision counter within the same second
    pub sequence: u32,
}

/// Append-only store of artifact snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist `content` as a new snapshot of `label`
    ///
    /// Returns only after the snapshot is durable.
    async fn snapshot(&self, label: &str, content: &[u8]) -> Result<Snapshot, BackupError>;

    /// Snapshots of `label`, oldest first
    async fn list(&self, label: &str) -> Result<Vec<Snapshot>, BackupError>;

    /// Content of snapshot `id`
    async fn load(&self, id: &str) -> Result<Vec<u8>, BackupError>;
}

/// Snapshots as files in one directory
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(label: &str, stamp: &str, sequence: u32) -> String {
        if sequence == 0 {
            format!("{label}.bak.{stamp}")
        } else {
            format!("{label}.bak.{stamp}-{sequence}")
        }
    }
}

/// Parse `<label>.bak.<stamp>[-N]`
fn parse_name(label: &str, name: &str) -> Option<Snapshot> {
    let rest = name.strip_prefix(label)?.strip_prefix(".bak.")?;
    let (stamp, sequence) = match rest.split_once('-') {
        Some((stamp, n)) => (stamp, n.parse().ok()?),
        None => (rest, 0),
    };
    let taken_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some(Snapshot {
        id: name.to_string(),
        label: label.to_string(),
        taken_at,
        sequence,
    })
}

/// Remove a snapshot file whose write failed, so `list` never sees it
async fn discard_partial(path: &Path, written: io::Result<()>) -> io::Result<()> {
    let Err(e) = written else { return Ok(()) };
    if let Err(cleanup) = tokio::fs::remove_file(path).await {
        tracing::warn!(snapshot = %path.display(), error = %cleanup, "partial snapshot left behind");
    }
    Err(e)
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn snapshot(&self, label: &str, content: &[u8]) -> Result<Snapshot, BackupError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| BackupError::Write {
                path: self.dir.clone(),
                source,
            })?;

        let now = Local::now().naive_local();
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();

        for sequence in 0..MAX_SAME_SECOND {
            let id = Self::file_name(label, &stamp, sequence);
            let path = self.dir.join(&id);
            let write_err = |source| BackupError::Write {
                path: path.clone(),
                source,
            };

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(write_err(e)),
            };
            let written = async {
                file.write_all(content).await?;
                file.sync_all().await
            }
            .await;
            discard_partial(&path, written).await.map_err(write_err)?;

            tracing::info!(snapshot = %path.display(), bytes = content.len(), "snapshot written");
            return parse_name(label, &id).ok_or(BackupError::NotFound(id));
        }

        Err(BackupError::Exhausted(label.to_string()))
    }

    async fn list(&self, label: &str) -> Result<Vec<Snapshot>, BackupError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(BackupError::Read {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut snapshots = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| BackupError::Read {
                path: self.dir.clone(),
                source,
            })?;
            let Some(entry) = entry else { break };
            if let Some(snapshot) = entry.file_name().to_str().and_then(|n| parse_name(label, n)) {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by(|a, b| (a.taken_at, a.sequence).cmp(&(b.taken_at, b.sequence)));
        Ok(snapshots)
    }

    async fn load(&self, id: &str) -> Result<Vec<u8>, BackupError> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(BackupError::NotFound(id.to_string()));
        }
        let path = self.dir.join(id);
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackupError::NotFound(id.to_string())),
            Err(source) => Err(BackupError::Read { path, source }),
        }
    }
}
