//! Whole-collection validation
//!
//! Runs over a proposed post-mutation state. Fatal findings reject the
//! mutation before anything is snapshotted or written; warnings travel with
//! the successful result.

use crate::finding::{Finding, FindingKind, Report, Severity};
use roster_record::{MediaPath, RecordKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Validator for proposed collection states
///
/// Media existence is only checked when a media root is configured.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    media_root: Option<PathBuf>,
}

impl Validator {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check media references for existence under `root`
    #[must_use]
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn media_root(&self) -> Option<&Path> {
        self.media_root.as_deref()
    }

    /// Validate a full proposed state
    ///
    /// # Findings
    /// - fatal: missing required field, duplicate id, malformed media path
    /// - warning: incomplete sub-entry, media file not found
    pub fn validate<K: RecordKind>(&self, records: &[K::Record]) -> Report {
        let mut report = Report::new();
        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let id = K::id(record);
            let finding = |severity, kind| Finding::on_record(severity, kind, index, id);

            for field in K::missing_fields(record) {
                report.push(finding(Severity::Fatal, FindingKind::MissingField { field }));
            }

            if !id.trim().is_empty() {
                if let Some(&first_index) = seen.get(id) {
                    report.push(finding(
                        Severity::Fatal,
                        FindingKind::DuplicateId {
                            id: id.to_string(),
                            first_index,
                        },
                    ));
                } else {
                    seen.insert(id, index);
                }
            }

            for media in K::media_refs(record) {
                match MediaPath::parse(media.path) {
                    Err(_) => report.push(finding(
                        Severity::Fatal,
                        FindingKind::MalformedMediaPath {
                            field: media.field,
                            path: media.path.to_string(),
                        },
                    )),
                    Ok(path) => {
                        let missing = self
                            .media_root
                            .as_deref()
                            .is_some_and(|root| !path.exists_under(root));
                        if missing {
                            report.push(finding(
                                Severity::Warning,
                                FindingKind::MissingMedia {
                                    field: media.field,
                                    path: path.to_string(),
                                },
                            ));
                        }
                    }
                }
            }

            for part in K::incomplete_parts(record) {
                report.push(finding(
                    Severity::Warning,
                    FindingKind::IncompletePart {
                        field: part.field,
                        index: part.index,
                        reason: part.reason,
                    },
                ));
            }
        }

        for f in report.fatal() {
            tracing::debug!(kind = K::KIND_ID, finding = %f, "validation rejected");
        }
        report
    }
}
