//! Mutation pipeline shared by every record kind
//!
//! ```text
//! load ─▶ transform ─▶ validate ─▶ sanitize ─▶ snapshot ─▶ write ─▶ journal
//!                         │
//!                         └─ any fatal finding: stop, nothing persisted
//! ```
//!
//! A transform is a pure function from the loaded collection to a
//! [`Proposal`]. The registry owns every side effect.

use crate::error::RosterError;
use crate::journal::ChangeJournal;
use roster_merge::{Finding, Report, Validator};
use roster_record::{Collection, DepartmentAliases, Fingerprint, Identity, RecordKind};
use roster_store::{Loaded, RecordStore, Snapshot, SnapshotStore, StorageBackend, SETTLE_TIMEOUT};
use std::sync::Arc;

/// Defaults that transforms consult
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub person_prefix: String,
    pub student_prefix: String,
    pub import_prefix: String,
    pub aliases: DepartmentAliases,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            person_prefix: "teacher".to_string(),
            student_prefix: "student".to_string(),
            import_prefix: "import".to_string(),
            aliases: DepartmentAliases::new(),
        }
    }
}

/// Proposed next state produced by a transform
#[derive(Debug, Clone)]
pub struct Proposal<K: RecordKind> {
    pub collection: Collection<K>,
    /// Findings the transform itself produced (e.g. row-level import findings)
    pub findings: Vec<Finding>,
    /// One-line description used as commit message and journal entry
    pub summary: String,
}

impl<K: RecordKind> Proposal<K> {
    #[must_use]
    pub fn new(collection: Collection<K>, summary: impl Into<String>) -> Self {
        Self {
            collection,
            findings: Vec::new(),
            summary: summary.into(),
        }
    }

    #[must_use]
    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings.extend(findings);
        self
    }
}

/// Result of an accepted mutation
#[derive(Debug, Clone)]
pub struct Outcome<K: RecordKind> {
    /// Collection as persisted (or as it would be, for a dry run)
    pub collection: Collection<K>,
    /// Fingerprint of the artifact after the call
    pub fingerprint: Fingerprint,
    pub warnings: Vec<Finding>,
    /// Snapshot of the prior state, if one was taken
    pub snapshot: Option<Snapshot>,
    pub summary: String,
    /// Proposed state differs from the loaded one
    pub changed: bool,
    pub dry_run: bool,
}

impl<K: RecordKind> Outcome<K> {
    /// Something was written
    #[inline]
    #[must_use]
    pub fn committed(&self) -> bool {
        self.changed && !self.dry_run
    }
}

/// Registry for one record kind
///
/// Ties a [`RecordStore`] to the snapshot store, validator and journal.
pub struct Registry<K: RecordKind, B> {
    store: RecordStore<K, B>,
    snapshots: Arc<dyn SnapshotStore>,
    label: String,
    validator: Validator,
    journal: ChangeJournal,
    defaults: Defaults,
}

impl<K: RecordKind, B: StorageBackend> Registry<K, B> {
    /// `label` names snapshots of this artifact (usually its file name)
    pub fn new(backend: B, snapshots: Arc<dyn SnapshotStore>, label: impl Into<String>) -> Self {
        Self {
            store: RecordStore::new(backend),
            snapshots,
            label: label.into(),
            validator: Validator::new(),
            journal: ChangeJournal::disabled(),
            defaults: Defaults::default(),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: ChangeJournal) -> Self {
        self.journal = journal;
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &RecordStore<K, B> {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn snapshots(&self) -> &dyn SnapshotStore {
        self.snapshots.as_ref()
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// Let background work started by committed writes finish
    ///
    /// Bounded by [`SETTLE_TIMEOUT`]; call before the runtime shuts down.
    pub async fn settle(&self) {
        self.store.backend().settle(SETTLE_TIMEOUT).await;
    }

    /// Read the current collection
    ///
    /// # Errors
    /// Store failures
    pub async fn read(&self) -> Result<(Collection<K>, Fingerprint), RosterError> {
        Ok(self.store.read().await?)
    }

    /// Validate the persisted collection as is
    ///
    /// # Errors
    /// Store failures; findings are returned, not raised
    pub async fn check(&self) -> Result<Report, RosterError> {
        let (collection, _) = self.read().await?;
        Ok(self.validator.validate::<K>(collection.records()))
    }

    /// Run one mutation through the pipeline
    ///
    /// The transform receives the loaded collection. With `dry_run` the
    /// proposal is validated and returned but nothing is snapshotted or
    /// written. A proposal equal to the loaded state is accepted without a
    /// snapshot or write.
    ///
    /// # Errors
    /// - whatever the transform returns
    /// - `Validation` if the proposed state has fatal findings
    /// - `Backup` if the prior state could not be snapshotted
    /// - `Conflict` / `Transient` / `Store` from the write
    pub async fn commit<F>(&self, dry_run: bool, transform: F) -> Result<Outcome<K>, RosterError>
    where
        F: FnOnce(Collection<K>) -> Result<Proposal<K>, RosterError>,
    {
        let Loaded {
            collection: current,
            fingerprint,
            raw,
        } = self.store.load().await?;

        let Proposal {
            mut collection,
            findings,
            summary,
        } = transform(current.clone())?;

        let mut report: Report = findings.into_iter().collect();
        report.absorb(self.validator.validate::<K>(collection.records()));
        if !report.is_accepted() {
            tracing::warn!(
                kind = K::KIND_ID,
                fatal = report.fatal().count(),
                %summary,
                "mutation rejected"
            );
            return Err(RosterError::Validation(report));
        }
        for finding in report.warnings() {
            tracing::warn!(kind = K::KIND_ID, %finding, "validation warning");
        }

        for record in collection.records_mut() {
            K::sanitize(record);
        }

        let changed = collection != current;
        let warnings = report.into_warnings();
        if dry_run || !changed {
            tracing::debug!(kind = K::KIND_ID, changed, dry_run, "nothing to write");
            return Ok(Outcome {
                collection,
                fingerprint,
                warnings,
                snapshot: None,
                summary,
                changed,
                dry_run,
            });
        }

        let snapshot = match &raw {
            Some(bytes) => Some(self.snapshots.snapshot(&self.label, bytes).await?),
            None => None,
        };

        let committed = self.store.write(&collection, &fingerprint, &summary).await?;
        tracing::info!(
            kind = K::KIND_ID,
            location = %self.store.describe(),
            records = collection.len(),
            fingerprint = committed.short(),
            %summary,
            "committed"
        );
        self.journal.record(&summary).await;

        Ok(Outcome {
            collection,
            fingerprint: committed,
            warnings,
            snapshot,
            summary,
            changed,
            dry_run,
        })
    }
}

/// Index of the record `identity` names
pub(crate) fn locate<K: RecordKind>(
    collection: &Collection<K>,
    identity: &Identity,
) -> Result<usize, RosterError> {
    collection
        .position(identity)
        .ok_or_else(|| RosterError::NotFound(identity.clone()))
}

/// Trimmed optional text; blank becomes `None`
pub(crate) fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
