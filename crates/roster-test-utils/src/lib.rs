//! Testing utilities for the roster workspace
//!
//! Shared fixtures, an in-memory remote repository and doubles for the
//! deploy and snapshot seams.

#![allow(missing_docs)]

use async_trait::async_trait;
use roster_merge::RawRow;
use roster_record::{Collection, ContentHash, Person, PersonRecord, Role};
use roster_store::{
    BackupError, ContentApi, DeployTrigger, RemoteFile, Snapshot, SnapshotStore, StoreError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub fn person(id: &str, name: &str) -> PersonRecord {
    PersonRecord::new(id, name)
}

/// `<prefix>_001` .. `<prefix>_<count>`, each with one role
pub fn numbered_people(prefix: &str, count: usize) -> Collection<Person> {
    Collection::new(
        (1..=count)
            .map(|n| {
                PersonRecord::new(format!("{prefix}_{n:03}"), format!("{prefix} {n}"))
                    .with_role(Role::new("声乐组", "声乐教师", i64::try_from(n).unwrap_or(0)))
            })
            .collect(),
    )
}

/// Founder with three roles
pub fn founder() -> PersonRecord {
    PersonRecord::new("admin_001", "陈涛")
        .with_photo("images/teachers/chen_tao.jpg")
        .with_role(Role::new("管理部", "创始人", 1))
        .with_role(Role::new("声乐组", "声乐教师", 2))
        .with_role(Role::new("理论组", "乐理教师", 3))
}

pub fn sample_people() -> Collection<Person> {
    Collection::new(vec![
        founder(),
        PersonRecord::new("admin_002", "王玉").with_role(Role::new("管理部", "校长", 2)),
        PersonRecord::new("vocal_001", "韩刚").with_role(Role::new("声乐组", "声乐教师", 10)),
    ])
}

pub fn encoded(collection: &Collection<Person>) -> Vec<u8> {
    collection.encode().unwrap()
}

/// Row with id, name and a full role
pub fn role_row(line: usize, id: &str, name: &str, department: &str, position: &str) -> RawRow {
    RawRow::new(line)
        .with_id(id)
        .with_name(name)
        .with_role(department, position, None)
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MemoryRepo {
    files: HashMap<String, RemoteFile>,
    fail_next: Option<String>,
    commits: Vec<String>,
}

/// In-memory hosted repository with blob-SHA preconditions
///
/// Clones share state, so two clones behave like two writers against one
/// repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentApi {
    repo: Arc<Mutex<MemoryRepo>>,
}

impl MemoryContentApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn sha(content: &[u8]) -> String {
        ContentHash::compute(content).to_string()
    }

    /// Put a file in place without a precondition
    pub fn seed(&self, path: &str, content: &[u8]) {
        locked(&self.repo).files.insert(
            path.to_string(),
            RemoteFile {
                content: content.to_vec(),
                sha: Self::sha(content),
            },
        );
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        locked(&self.repo).files.get(path).map(|f| f.content.clone())
    }

    pub fn sha_of(&self, path: &str) -> Option<String> {
        locked(&self.repo).files.get(path).map(|f| f.sha.clone())
    }

    /// Commit messages accepted so far
    pub fn commits(&self) -> Vec<String> {
        locked(&self.repo).commits.clone()
    }

    /// Make the next call fail as a timeout
    pub fn fail_next_with_timeout(&self) {
        locked(&self.repo).fail_next = Some("operation timed out".to_string());
    }

    fn take_failure(&self, path: &str) -> Result<(), StoreError> {
        match locked(&self.repo).fail_next.take() {
            Some(message) => Err(StoreError::transient(self.location(path), message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContentApi for MemoryContentApi {
    async fn get(&self, path: &str) -> Result<Option<RemoteFile>, StoreError> {
        self.take_failure(path)?;
        Ok(locked(&self.repo).files.get(path).cloned())
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, StoreError> {
        self.take_failure(path)?;
        let mut repo = locked(&self.repo);
        let current = repo.files.get(path).map(|f| f.sha.as_str());
        if current != sha {
            return Err(StoreError::Conflict {
                location: self.location(path),
                expected: sha.map_or(roster_record::Fingerprint::Absent, |s| {
                    roster_record::Fingerprint::digest(s)
                }),
            });
        }
        let new_sha = Self::sha(content);
        repo.files.insert(
            path.to_string(),
            RemoteFile {
                content: content.to_vec(),
                sha: new_sha.clone(),
            },
        );
        repo.commits.push(message.to_string());
        Ok(new_sha)
    }

    fn location(&self, path: &str) -> String {
        format!("memory:{path}")
    }
}

/// Deploy trigger that counts invocations
#[derive(Debug, Clone, Default)]
pub struct CountingTrigger {
    fired: Arc<AtomicUsize>,
    settled: Arc<AtomicUsize>,
}

impl CountingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn settled(&self) -> usize {
        self.settled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeployTrigger for CountingTrigger {
    fn trigger(&self, _reason: &str) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }

    async fn settle(&self, _within: Duration) {
        self.settled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Snapshot store whose writes always fail
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn snapshot(&self, label: &str, _content: &[u8]) -> Result<Snapshot, BackupError> {
        Err(BackupError::Write {
            path: label.into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "no space left on device"),
        })
    }

    async fn list(&self, _label: &str) -> Result<Vec<Snapshot>, BackupError> {
        Ok(Vec::new())
    }

    async fn load(&self, id: &str) -> Result<Vec<u8>, BackupError> {
        Err(BackupError::NotFound(id.to_string()))
    }
}

/// Fresh temp directory for an artifact root
pub fn workspace() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}
