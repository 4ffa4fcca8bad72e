//! Roster storage
//!
//! Persists record collections through a [`StorageBackend`], either a local
//! file or a file in a remote repository, and keeps pre-write snapshots in a
//! [`SnapshotStore`].
//!
//! # Concurrency
//!
//! Every write carries the [`Fingerprint`](roster_record::Fingerprint) the
//! caller read. A mismatch is [`StoreError::Conflict`]; the store never
//! merges or retries on its own.
//!
//! # Example
//!
//! ```rust,ignore
//! use roster_store::{LocalBackend, RecordStore};
//! use roster_record::Person;
//!
//! let store = RecordStore::<Person, _>::new(LocalBackend::new("data/teachers.json"));
//! let (people, fingerprint) = store.read().await?;
//! store.write(&people, &fingerprint, "touch").await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod backend;
mod deploy;
mod error;
mod local;
mod remote;
mod snapshot;
mod store;

pub use backend::{ArtifactState, StorageBackend};
pub use deploy::{DeployTrigger, NoopTrigger, WebhookTrigger, SETTLE_TIMEOUT};
pub use error::{BackupError, StoreError};
pub use local::LocalBackend;
pub use remote::{
    CommitAuthor, ContentApi, GitHubApi, GitHubConfig, RemoteBackend, RemoteFile, DEFAULT_TIMEOUT,
    GITHUB_API,
};
pub use snapshot::{FsSnapshotStore, Snapshot, SnapshotStore};
pub use store::{Loaded, RecordStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
