//! Role merging
//!
//! Folds raw rows that describe the same person into one record. Rows are
//! grouped by id; a row without id joins the group of a row carrying the same
//! exact name and an id, otherwise it forms a name-keyed group whose id is
//! resolved later by the caller.
//!
//! # Merge rules
//! - scalars (`name`, `photo`, `shortSummary`, `bio`): last non-empty wins
//! - `roles`: concatenated in input order; an identical department/position
//!   is kept once with the smaller order
//! - `achievements`: concatenated, exact duplicates skipped

use crate::finding::{Finding, FindingKind, Subject};
use crate::row::{RawRow, RowRole};
use indexmap::IndexMap;
use roster_record::PersonRecord;
use std::collections::HashMap;

/// How a merged group was keyed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Id(String),
    /// No row in the group carried an id
    Name(String),
}

/// One merged person and the source lines that built it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub key: GroupKey,
    /// `id` is empty for name-keyed groups
    pub record: PersonRecord,
    pub lines: Vec<usize>,
}

/// Result of merging a row set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Groups in order of first appearance
    pub records: Vec<MergedRecord>,
    pub findings: Vec<Finding>,
}

/// Stateless row merger
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleMerger;

impl RoleMerger {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Merge rows into one record per logical person
    ///
    /// A partial role yields a warning and contributes nothing; a row with
    /// neither id nor name yields a fatal finding and is skipped.
    #[must_use]
    pub fn merge(&self, rows: &[RawRow]) -> MergeOutcome {
        // name -> id of the first row naming both
        let mut named_ids: HashMap<&str, &str> = HashMap::new();
        for row in rows {
            if let (Some(id), Some(name)) = (&row.id, &row.name) {
                named_ids.entry(name.as_str()).or_insert(id.as_str());
            }
        }

        let mut groups: IndexMap<GroupKey, MergedRecord> = IndexMap::new();
        let mut findings = Vec::new();

        for row in rows {
            let subject = Subject::Row { line: row.line };
            if row.is_unidentified() {
                findings.push(Finding::fatal(FindingKind::UnidentifiedRow, subject));
                continue;
            }
            let key = match (&row.id, &row.name) {
                (Some(id), _) => GroupKey::Id(id.clone()),
                (None, Some(name)) => match named_ids.get(name.as_str()) {
                    Some(id) => GroupKey::Id((*id).to_string()),
                    None => GroupKey::Name(name.clone()),
                },
                (None, None) => continue,
            };

            if let RowRole::Partial {
                department,
                position,
            } = &row.role
            {
                tracing::warn!(line = row.line, "dropping role with only one of department/position");
                findings.push(Finding::warning(
                    FindingKind::PartialRole {
                        department: department.clone(),
                        position: position.clone(),
                    },
                    subject,
                ));
            }

            let group = groups.entry(key.clone()).or_insert_with(|| MergedRecord {
                record: PersonRecord::new(
                    match &key {
                        GroupKey::Id(id) => id.clone(),
                        GroupKey::Name(_) => String::new(),
                    },
                    "",
                ),
                key,
                lines: Vec::new(),
            });
            group.lines.push(row.line);
            absorb(&mut group.record, row_record(row));
        }

        MergeOutcome {
            records: groups.into_values().collect(),
            findings,
        }
    }
}

/// Record carrying exactly what one row contributes
fn row_record(row: &RawRow) -> PersonRecord {
    let mut record = PersonRecord::new(
        row.id.clone().unwrap_or_default(),
        row.name.clone().unwrap_or_default(),
    );
    record.photo = row.photo.clone();
    record.short_summary = row.short_summary.clone();
    record.bio = row.bio.clone();
    record.achievements = row.achievements.clone();
    if let RowRole::Complete(role) = &row.role {
        record.roles.push(role.clone());
    }
    record
}

/// Merge `incoming` into `target`
///
/// Non-empty incoming scalars overwrite; roles and achievements append with
/// dedup. The target id is never changed.
pub fn absorb(target: &mut PersonRecord, incoming: PersonRecord) {
    if !incoming.name.trim().is_empty() {
        target.name = incoming.name;
    }
    overwrite(&mut target.photo, incoming.photo);
    overwrite(&mut target.short_summary, incoming.short_summary);
    overwrite(&mut target.bio, incoming.bio);
    for achievement in incoming.achievements {
        target.ensure_achievement(achievement);
    }
    for role in incoming.roles {
        target.ensure_role(role);
    }
}

fn overwrite(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roster_record::Role;

    #[test]
    fn half_role_row_contributes_no_role() {
        let rows = vec![
            RawRow::new(2)
                .with_id("admin_001")
                .with_name("陈涛")
                .with_role("管理部", "创始人", Some(1)),
            RawRow::new(3)
                .with_id("admin_001")
                .with_role("管理部", "", None),
        ];
        let outcome = RoleMerger::new().merge(&rows);

        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0].record;
        assert_eq!(record.roles, vec![Role::new("管理部", "创始人", 1)]);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].subject, Subject::Row { line: 3 });
        assert!(!outcome.findings[0].is_fatal());
    }

    #[test]
    fn name_only_row_joins_id_group() {
        let rows = vec![
            RawRow::new(2).with_name("王玉").with_role("声乐组", "声乐教师", Some(20)),
            RawRow::new(3)
                .with_id("admin_002")
                .with_name("王玉")
                .with_role("管理部", "校长", Some(2)),
        ];
        let outcome = RoleMerger::new().merge(&rows);

        assert_eq!(outcome.records.len(), 1);
        let merged = &outcome.records[0];
        assert_eq!(merged.key, GroupKey::Id("admin_002".to_string()));
        assert_eq!(merged.lines, vec![2, 3]);
        assert_eq!(merged.record.roles.len(), 2);
        assert_eq!(merged.record.roles[0].department, "声乐组");
    }

    #[test]
    fn unmatched_name_forms_name_group() {
        let rows = vec![RawRow::new(2).with_name("新老师")];
        let outcome = RoleMerger::new().merge(&rows);
        assert_eq!(outcome.records[0].key, GroupKey::Name("新老师".to_string()));
        assert!(outcome.records[0].record.id.is_empty());
    }

    #[test]
    fn last_non_empty_scalar_wins() {
        let mut first = RawRow::new(2).with_id("a_001").with_name("旧名").with_photo("a.jpg");
        first.bio = Some("first bio".to_string());
        let second = RawRow::new(3).with_id("a_001").with_name("新名");
        let outcome = RoleMerger::new().merge(&[first, second]);

        let record = &outcome.records[0].record;
        assert_eq!(record.name, "新名");
        assert_eq!(record.photo.as_deref(), Some("a.jpg"));
        assert_eq!(record.bio.as_deref(), Some("first bio"));
    }

    #[test]
    fn duplicate_roles_and_achievements_collapse() {
        let rows = vec![
            RawRow::new(2)
                .with_id("a_001")
                .with_name("x")
                .with_achievement("金奖")
                .with_role("d", "p", Some(5)),
            RawRow::new(3)
                .with_id("a_001")
                .with_achievement("金奖")
                .with_role("d", "p", Some(3)),
        ];
        let record = &RoleMerger::new().merge(&rows).records[0].record;
        assert_eq!(record.roles, vec![Role::new("d", "p", 3)]);
        assert_eq!(record.achievements, vec!["金奖"]);
    }

    #[test]
    fn unidentified_row_is_fatal() {
        let outcome = RoleMerger::new().merge(&[RawRow::new(7).with_photo("a.jpg")]);
        assert!(outcome.records.is_empty());
        assert!(outcome.findings[0].is_fatal());
        assert_eq!(outcome.findings[0].kind, FindingKind::UnidentifiedRow);
    }

    #[test]
    fn absorb_keeps_target_id() {
        let mut target = PersonRecord::new("a_001", "x").with_role(Role::new("d", "p", 1));
        let mut incoming = PersonRecord::new("other", "y").with_role(Role::new("d", "q", 2));
        incoming.photo = Some(String::new());
        absorb(&mut target, incoming);
        assert_eq!(target.id, "a_001");
        assert_eq!(target.name, "y");
        assert_eq!(target.photo, None);
        assert_eq!(target.roles.len(), 2);
    }
}
