//! Closed operation sets
//!
//! Every command the roster accepts is one variant here, carrying the
//! parameters it needs. [`Registry::execute`](crate::Registry) dispatches
//! them exhaustively.

use roster_merge::{Finding, RawRow, Report, Table};
use roster_record::{Admission, Collection, Identity, RecordKind, Role};

use crate::registry::Outcome;

/// Operations on people
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Full scan, optionally only people holding a role in `department`
    List { department: Option<String> },
    /// Validate the persisted collection without changing it
    Validate,
    AddPerson(NewPerson),
    /// Without `order` the role goes after the person's highest order
    AddRole {
        identity: Identity,
        department: String,
        position: String,
        order: Option<i64>,
    },
    EditPerson { identity: Identity, edit: PersonEdit },
    /// `index` is 1-based, as shown by `list`
    EditRole {
        identity: Identity,
        index: usize,
        edit: RoleEdit,
    },
    RemoveRole { identity: Identity, index: usize },
    Remove { identity: Identity },
    SyncFromSource {
        source: ImportSource,
        mode: ImportMode,
        dry_run: bool,
    },
    Reorder(Reorder),
}

/// Parameters of a new person
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPerson {
    /// Explicit id; allocated from `prefix` when absent
    pub id: Option<String>,
    /// Category prefix; configured default when absent
    pub prefix: Option<String>,
    pub name: String,
    pub photo: Option<String>,
    pub short_summary: Option<String>,
    pub bio: Option<String>,
    pub achievements: Vec<String>,
    pub roles: Vec<Role>,
}

impl NewPerson {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }
}

/// Field changes for a person
///
/// `Some("")` clears an optional text field. The id cannot be edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonEdit {
    pub name: Option<String>,
    pub photo: Option<String>,
    pub short_summary: Option<String>,
    pub bio: Option<String>,
    pub append_achievements: Vec<String>,
    /// Applied before `append_achievements`
    pub clear_achievements: bool,
}

impl PersonEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Field changes for one role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleEdit {
    pub department: Option<String>,
    pub position: Option<String>,
    pub order: Option<i64>,
}

/// Import rows, already parsed or as a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Rows(Vec<RawRow>),
    Table(Table),
}

/// How imported records meet existing ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Non-empty fields overwrite, roles and achievements append
    #[default]
    Merge,
    /// Imported record replaces the existing one in place
    Replace,
}

/// Explicit reordering of the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reorder {
    /// Sort by each person's smallest role order, then name
    ByRoleOrder,
    /// Move one record to a 1-based position (clamped to the collection)
    Move { identity: Identity, to: usize },
    /// Re-rank the roles of one department in a single change
    ///
    /// Each entry names a person and a 1-based role index. Listed roles get
    /// consecutive orders starting at the department's current smallest
    /// order (1 if it has none); unlisted roles of the department follow in
    /// their previous order.
    Department {
        department: String,
        roles: Vec<(Identity, usize)>,
    },
}

/// Operations on students
#[derive(Debug, Clone, PartialEq)]
pub enum StudentOperation {
    /// Full scan, optionally only students of `school`
    List { school: Option<String> },
    Validate,
    AddStudent(NewStudent),
    AddAdmission {
        identity: Identity,
        admission: Admission,
    },
    EditStudent {
        identity: Identity,
        edit: StudentEdit,
    },
    /// `index` is 1-based
    RemoveAdmission { identity: Identity, index: usize },
    Remove { identity: Identity },
    /// Write back a batch of produced admission images in one commit
    RecordAdmissions(AdmissionBatch),
}

/// Parameters of a new student
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStudent {
    pub id: Option<String>,
    pub name: String,
    pub school: String,
    pub major: String,
    pub year: Option<i32>,
    pub photo: Option<String>,
}

/// Field changes for a student
///
/// `photo: Some("")` clears the photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentEdit {
    pub name: Option<String>,
    pub school: Option<String>,
    pub major: Option<String>,
    pub year: Option<i32>,
    pub photo: Option<String>,
}

/// One produced image, named `<name>__<school>__<anything>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionEntry {
    /// Media path relative to the site root
    pub image: String,
    pub watermarked: bool,
}

impl AdmissionEntry {
    #[must_use]
    pub fn watermarked(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            watermarked: true,
        }
    }
}

/// Accumulated output of a batch image run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionBatch {
    pub entries: Vec<AdmissionEntry>,
    /// Create students named by an entry but not found
    pub create_missing: bool,
    /// Major for created students
    pub major: Option<String>,
    /// Year for created students
    pub year: Option<i32>,
    /// Note attached to every admission
    pub note: Option<String>,
}

/// Counts reported by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows read from the source
    pub rows: usize,
    /// Records after merging rows
    pub records: usize,
    pub created: usize,
    pub updated: usize,
}

/// Counts reported by an admission write-back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionSummary {
    pub entries: usize,
    /// Admissions added to a student
    pub attached: usize,
    /// Students created for unmatched entries
    pub created: usize,
    /// Images skipped: unparseable name, no matching student, or already present
    pub skipped: Vec<String>,
}

/// What an executed operation returns
#[derive(Debug, Clone)]
pub enum Response<K: RecordKind> {
    Listing(Collection<K>),
    Validated(Report),
    Changed(Outcome<K>),
    Imported {
        outcome: Outcome<K>,
        summary: ImportSummary,
    },
    AdmissionsRecorded {
        outcome: Outcome<K>,
        summary: AdmissionSummary,
    },
}

impl<K: RecordKind> Response<K> {
    #[must_use]
    pub fn outcome(&self) -> Option<&Outcome<K>> {
        match self {
            Self::Changed(outcome)
            | Self::Imported { outcome, .. }
            | Self::AdmissionsRecorded { outcome, .. } => Some(outcome),
            Self::Listing(_) | Self::Validated(_) => None,
        }
    }

    /// Non-fatal findings that came with the response
    #[must_use]
    pub fn warnings(&self) -> Vec<&Finding> {
        match self {
            Self::Validated(report) => report.warnings().collect(),
            Self::Listing(_) => Vec::new(),
            Self::Changed(outcome)
            | Self::Imported { outcome, .. }
            | Self::AdmissionsRecorded { outcome, .. } => outcome.warnings.iter().collect(),
        }
    }
}
