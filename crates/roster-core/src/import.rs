//! Import pipeline
//!
//! ```text
//! ImportSource ─▶ RawRow* ─▶ RoleMerger ─▶ resolve ids ─▶ meet existing ─▶ Proposal
//! ```
//!
//! Media files are never touched; only their paths travel with the records.

use crate::error::{ConfigError, RosterError};
use crate::operation::{ImportMode, ImportSource, ImportSummary};
use crate::registry::{Defaults, Proposal};
use roster_merge::{absorb, GroupKey, RawRow, RoleMerger, RowBatch, RowRole, Table};
use roster_record::{Collection, Identity, IdentityAllocator, Person};
use serde_json::Value;

/// Merge `source` into `people`
///
/// Name-only groups take the id of an existing person with that exact name,
/// else a fresh id from the import prefix. Matched records are merged or
/// replaced in place; new records are appended.
///
/// # Errors
/// `Import` if a table lacks a required column, `Allocation` if the import
/// prefix sequence is corrupt
pub(crate) fn sync_from_source(
    mut people: Collection<Person>,
    defaults: &Defaults,
    source: ImportSource,
    mode: ImportMode,
) -> Result<(Proposal<Person>, ImportSummary), RosterError> {
    let batch = match source {
        ImportSource::Table(table) => table.into_rows(&defaults.aliases)?,
        ImportSource::Rows(rows) => RowBatch {
            rows: rows.into_iter().map(|row| canonical_row(row, defaults)).collect(),
            findings: Vec::new(),
        },
    };
    let merged = RoleMerger::new().merge(&batch.rows);

    let known: Vec<String> = people
        .ids()
        .map(str::to_string)
        .chain(merged.records.iter().map(|m| m.record.id.clone()))
        .collect();
    let mut allocator = IdentityAllocator::scan(&defaults.import_prefix, known.iter().map(String::as_str))?;

    let mut summary = ImportSummary {
        rows: batch.rows.len(),
        records: merged.records.len(),
        ..ImportSummary::default()
    };

    for group in merged.records {
        let mut record = group.record;
        if let GroupKey::Name(name) = &group.key {
            record.id = match people.get(&Identity::name(name.as_str())) {
                Some(existing) => existing.id.clone(),
                None => allocator.next_id()?,
            };
            tracing::debug!(%name, id = %record.id, "resolved name-only import group");
        }

        match people.position(&Identity::id(record.id.as_str())) {
            Some(index) => {
                let slot = &mut people.records_mut()[index];
                let before = slot.clone();
                match mode {
                    ImportMode::Merge => absorb(slot, record),
                    ImportMode::Replace => *slot = record,
                }
                if *slot != before {
                    summary.updated += 1;
                }
            }
            None => {
                people.push(record);
                summary.created += 1;
            }
        }
    }

    let mut findings = batch.findings;
    findings.extend(merged.findings);
    tracing::info!(
        rows = summary.rows,
        created = summary.created,
        updated = summary.updated,
        ?mode,
        "import planned"
    );

    let message = format!(
        "import {} rows: {} created, {} updated",
        summary.rows, summary.created, summary.updated
    );
    Ok((Proposal::new(people, message).with_findings(findings), summary))
}

fn canonical_row(mut row: RawRow, defaults: &Defaults) -> RawRow {
    row.role = match row.role {
        RowRole::Complete(mut role) => {
            role.department = defaults.aliases.canonical(&role.department);
            RowRole::Complete(role)
        }
        RowRole::Partial {
            department,
            position,
        } => RowRole::Partial {
            department: department.map(|d| defaults.aliases.canonical(&d)),
            position,
        },
        RowRole::None => RowRole::None,
    };
    row
}

/// Build a table from JSON
///
/// Accepts either `{"header": [...], "rows": [[...], ...]}` or an array of
/// objects keyed by column name. Numbers become their decimal text and
/// arrays of strings are joined with `|`.
///
/// # Errors
/// `Source` if the document has neither shape
pub fn table_from_json(bytes: &[u8]) -> Result<Table, ConfigError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ConfigError::Source(format!("not JSON: {e}")))?;

    match value {
        Value::Object(mut map) if map.contains_key("header") => {
            let header = string_cells(map.remove("header"), "header")?;
            let rows = match map.remove("rows") {
                Some(Value::Array(rows)) => rows
                    .into_iter()
                    .map(|row| string_cells(Some(row), "rows[]"))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
                Some(_) => return Err(ConfigError::Source("'rows' must be an array".to_string())),
            };
            Ok(Table::new(header, rows))
        }
        Value::Array(items) => {
            let mut header: Vec<String> = Vec::new();
            for item in &items {
                let Value::Object(map) = item else {
                    return Err(ConfigError::Source("array items must be objects".to_string()));
                };
                for key in map.keys() {
                    if !header.contains(key) {
                        header.push(key.clone());
                    }
                }
            }
            let rows = items
                .iter()
                .map(|item| header.iter().map(|column| cell_text(item.get(column))).collect())
                .collect();
            Ok(Table::new(header, rows))
        }
        _ => Err(ConfigError::Source(
            "expected an array of rows or an object with 'header' and 'rows'".to_string(),
        )),
    }
}

fn string_cells(value: Option<Value>, what: &str) -> Result<Vec<String>, ConfigError> {
    match value {
        Some(Value::Array(cells)) => Ok(cells.iter().map(|c| cell_text(Some(c))).collect()),
        _ => Err(ConfigError::Source(format!("'{what}' must be an array"))),
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| cell_text(Some(v)))
            .collect::<Vec<_>>()
            .join("|"),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roster_merge::FindingKind;
    use roster_record::{DepartmentAliases, Role};
    use roster_test_utils::{role_row, sample_people};

    fn plan(
        people: Collection<Person>,
        rows: Vec<RawRow>,
        mode: ImportMode,
    ) -> (Proposal<Person>, ImportSummary) {
        sync_from_source(people, &Defaults::default(), ImportSource::Rows(rows), mode).unwrap()
    }

    #[test]
    fn merge_appends_roles_to_existing_person() {
        let (proposal, summary) = plan(
            sample_people(),
            vec![role_row(2, "vocal_001", "韩刚", "理论组", "乐理教师")],
            ImportMode::Merge,
        );
        let record = proposal.collection.get(&Identity::id("vocal_001")).unwrap();
        assert_eq!(record.roles.len(), 2);
        assert_eq!(
            summary,
            ImportSummary {
                rows: 1,
                records: 1,
                created: 0,
                updated: 1
            }
        );
    }

    #[test]
    fn replace_swaps_record_in_place() {
        let (proposal, _) = plan(
            sample_people(),
            vec![role_row(2, "admin_001", "陈涛", "声乐组", "声乐教师")],
            ImportMode::Replace,
        );
        assert_eq!(proposal.collection.records()[0].id, "admin_001");
        assert_eq!(
            proposal.collection.records()[0].roles,
            vec![Role::new("声乐组", "声乐教师", Role::UNORDERED)]
        );
        assert_eq!(proposal.collection.records()[0].photo, None);
    }

    #[test]
    fn name_only_rows_resolve_or_allocate() {
        let rows = vec![
            RawRow::new(2).with_name("王玉").with_role("声乐组", "声乐教师", Some(5)),
            RawRow::new(3).with_name("新人甲"),
            RawRow::new(4).with_name("新人乙"),
        ];
        let (proposal, summary) = plan(sample_people(), rows, ImportMode::Merge);

        assert_eq!(summary.created, 2);
        assert_eq!(summary.updated, 1);
        let ids: Vec<&str> = proposal.collection.ids().collect();
        assert_eq!(
            ids,
            vec!["admin_001", "admin_002", "vocal_001", "import_001", "import_002"]
        );
        assert_eq!(proposal.collection.records()[1].roles.len(), 2);
    }

    #[test]
    fn row_departments_are_canonicalized() {
        let defaults = Defaults {
            aliases: DepartmentAliases::new().with("理论组教师", "理论组"),
            ..Defaults::default()
        };
        let (proposal, _) = sync_from_source(
            Collection::default(),
            &defaults,
            ImportSource::Rows(vec![role_row(2, "t_001", "x", "理论组教师", "乐理")]),
            ImportMode::Merge,
        )
        .unwrap();
        assert_eq!(proposal.collection.records()[0].roles[0].department, "理论组");
    }

    #[test]
    fn table_findings_travel_with_proposal() {
        let table = Table::new(
            vec!["id".into(), "name".into(), "department".into(), "position".into(), "order".into()],
            vec![
                vec!["admin_001".into(), "陈涛".into(), "管理部".into(), "创始人".into(), "x".into()],
                vec!["admin_001".into(), String::new(), "管理部".into(), String::new(), String::new()],
            ],
        );
        let (proposal, summary) = sync_from_source(
            Collection::default(),
            &Defaults::default(),
            ImportSource::Table(table),
            ImportMode::Merge,
        )
        .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(proposal.findings.len(), 2);
        assert!(matches!(proposal.findings[0].kind, FindingKind::InvalidOrder { .. }));
        assert!(matches!(proposal.findings[1].kind, FindingKind::PartialRole { .. }));
        assert_eq!(proposal.collection.records()[0].roles.len(), 1);
    }

    #[test]
    fn missing_required_column_is_an_import_error() {
        let table = Table::new(vec!["name".into()], vec![vec!["x".into()]]);
        let err = sync_from_source(
            Collection::default(),
            &Defaults::default(),
            ImportSource::Table(table),
            ImportMode::Merge,
        )
        .unwrap_err();
        assert!(matches!(err, RosterError::Import(_)));
    }

    #[test]
    fn table_from_object_array() {
        let table = table_from_json(
            r#"[
                {"id": "a_001", "name": "甲", "order": 3, "achievements": ["金奖", "银奖"]},
                {"name": "乙", "department": "声乐组"}
            ]"#
            .as_bytes(),
        )
        .unwrap();
        // object keys arrive sorted
        assert_eq!(table.header, vec!["achievements", "id", "name", "order", "department"]);
        assert_eq!(table.rows[0], vec!["金奖|银奖", "a_001", "甲", "3", ""]);
        assert_eq!(table.rows[1], vec!["", "", "乙", "", "声乐组"]);
    }

    #[test]
    fn table_from_header_and_rows() {
        let table =
            table_from_json(br#"{"header": ["id", "name"], "rows": [["a_001", "x"]]}"#).unwrap();
        assert_eq!(table.rows, vec![vec!["a_001".to_string(), "x".to_string()]]);
        assert!(table_from_json(b"42").is_err());
    }
}
