//! Validation findings and the report that collects them

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Mutation is rejected
    Fatal,
    /// Reported alongside a successful result
    Warning,
}

/// Stable classification of a finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    /// Two records share an identifier
    DuplicateId { id: String, first_index: usize },

    /// A required field is blank
    MissingField { field: &'static str },

    /// Media path is absolute, escapes its root or is empty
    MalformedMediaPath { field: String, path: String },

    /// Media path is well formed but the file was not found
    MissingMedia { field: String, path: String },

    /// A role, admission or similar sub-entry was dropped
    IncompletePart {
        field: &'static str,
        index: usize,
        reason: String,
    },

    /// Import row with exactly one of department/position; role dropped
    PartialRole {
        department: Option<String>,
        position: Option<String>,
    },

    /// Import row with neither id nor name
    UnidentifiedRow,

    /// Import row whose order cell is not an integer
    InvalidOrder { raw: String },
}

/// What a finding is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Subject {
    /// A record in the proposed collection
    Record { index: usize, id: Option<String> },
    /// A raw import row (1-based source line, header is line 1)
    Row { line: usize },
}

/// One validator finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: FindingKind,
    /// Nested; record and part fields share names like `index` and `id`
    pub subject: Subject,
}

impl Finding {
    #[must_use]
    pub fn fatal(kind: FindingKind, subject: Subject) -> Self {
        Self {
            severity: Severity::Fatal,
            kind,
            subject,
        }
    }

    #[must_use]
    pub fn warning(kind: FindingKind, subject: Subject) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            subject,
        }
    }

    /// Finding about the record at `index`
    #[must_use]
    pub fn on_record(severity: Severity, kind: FindingKind, index: usize, id: &str) -> Self {
        let id = (!id.trim().is_empty()).then(|| id.to_string());
        Self {
            severity,
            kind,
            subject: Subject::Record { index, id },
        }
    }

    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record {
                index,
                id: Some(id),
            } => write!(f, "record #{} ({id})", index + 1),
            Self::Record { index, id: None } => write!(f, "record #{}", index + 1),
            Self::Row { line } => write!(f, "row {line}"),
        }
    }
}

impl Display for FindingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id, first_index } => {
                write!(f, "duplicate id '{id}' (first used by record #{})", first_index + 1)
            }
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::MalformedMediaPath { field, path } => {
                write!(f, "malformed media path in {field}: '{path}'")
            }
            Self::MissingMedia { field, path } => write!(f, "{field} file not found: '{path}'"),
            Self::IncompletePart {
                field,
                index,
                reason,
            } => write!(f, "{field}[{}] dropped: {reason}", index + 1),
            Self::PartialRole {
                department: Some(department),
                ..
            } => write!(f, "role dropped: department '{department}' without position"),
            Self::PartialRole {
                position: Some(position),
                ..
            } => write!(f, "role dropped: position '{position}' without department"),
            Self::PartialRole { .. } => f.write_str("role dropped: incomplete"),
            Self::UnidentifiedRow => f.write_str("row has neither id nor name"),
            Self::InvalidOrder { raw } => {
                write!(f, "order '{raw}' is not an integer; role sorts last")
            }
        }
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Fatal => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag}: {}: {}", self.subject, self.kind)
    }
}

/// Collected findings for one proposed state
///
/// The state is accepted when no finding is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report {
    findings: Vec<Finding>,
}

impl Report {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Append every finding of `other`
    pub fn absorb(&mut self, other: Report) {
        self.findings.extend(other.findings);
    }

    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !self.findings.iter().any(Finding::is_fatal)
    }

    pub fn fatal(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_fatal())
    }

    /// Only the warnings, for returning with a successful result
    #[must_use]
    pub fn into_warnings(self) -> Vec<Finding> {
        self.findings.into_iter().filter(|f| !f.is_fatal()).collect()
    }

    #[inline]
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let fatal = self.fatal().count();
        write!(
            f,
            "{fatal} error(s), {} warning(s)",
            self.findings.len() - fatal
        )?;
        for finding in &self.findings {
            write!(f, "\n  {finding}")?;
        }
        Ok(())
    }
}

impl FromIterator<Finding> for Report {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        Self {
            findings: iter.into_iter().collect(),
        }
    }
}
