//! Raw import rows
//!
//! Source sheets are parsed elsewhere; what arrives here is a header plus
//! string cells. [`Table::into_rows`] turns them into [`RawRow`] values whose
//! optional fields are explicit, so the merger never probes for columns.

use crate::finding::{Finding, FindingKind, Subject};
use roster_record::text::non_blank;
use roster_record::{DepartmentAliases, Role};

/// Fixed import columns
pub const COLUMNS: [&str; 9] = [
    "id",
    "name",
    "photo",
    "shortSummary",
    "bio",
    "achievements",
    "department",
    "position",
    "order",
];

/// Columns a table must carry
pub const REQUIRED_COLUMNS: [&str; 2] = ["id", "name"];

/// Errors turning a table into rows
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Role cell state of a row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RowRole {
    /// Neither department nor position given
    #[default]
    None,
    /// Both given
    Complete(Role),
    /// Exactly one given; dropped with a warning
    Partial {
        department: Option<String>,
        position: Option<String>,
    },
}

impl RowRole {
    /// Classify department/position cells
    #[must_use]
    pub fn from_cells(department: Option<String>, position: Option<String>, order: i64) -> Self {
        match (department, position) {
            (None, None) => Self::None,
            (Some(department), Some(position)) => {
                Self::Complete(Role::new(department, position, order))
            }
            (department, position) => Self::Partial {
                department,
                position,
            },
        }
    }
}

/// One normalized source row
///
/// Blank cells are `None`; achievements are already split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based source line (header is line 1)
    pub line: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub short_summary: Option<String>,
    pub bio: Option<String>,
    pub achievements: Vec<String>,
    pub role: RowRole,
}

impl RawRow {
    #[must_use]
    pub fn new(line: usize) -> Self {
        Self {
            line,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl AsRef<str>) -> Self {
        self.id = non_blank(id.as_ref());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl AsRef<str>) -> Self {
        self.name = non_blank(name.as_ref());
        self
    }

    #[must_use]
    pub fn with_photo(mut self, photo: impl AsRef<str>) -> Self {
        self.photo = trimmed(photo.as_ref());
        self
    }

    #[must_use]
    pub fn with_achievement(mut self, achievement: impl AsRef<str>) -> Self {
        if let Some(a) = non_blank(achievement.as_ref()) {
            self.achievements.push(a);
        }
        self
    }

    /// Set role cells; blank values count as absent
    #[must_use]
    pub fn with_role(mut self, department: &str, position: &str, order: Option<i64>) -> Self {
        self.role = RowRole::from_cells(
            non_blank(department),
            non_blank(position),
            order.unwrap_or(Role::UNORDERED),
        );
        self
    }

    /// Row carries neither id nor name
    #[inline]
    #[must_use]
    pub fn is_unidentified(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

/// Rows parsed from a table, with per-row findings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBatch {
    pub rows: Vec<RawRow>,
    pub findings: Vec<Finding>,
}

/// Tabular source: header and string cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

struct ColumnMap {
    slots: [Option<usize>; COLUMNS.len()],
}

impl ColumnMap {
    fn resolve(header: &[String]) -> Result<Self, ImportError> {
        let mut slots = [None; COLUMNS.len()];
        for (slot, column) in slots.iter_mut().zip(COLUMNS) {
            *slot = header.iter().position(|h| h.trim() == column);
        }
        for required in REQUIRED_COLUMNS {
            let index = COLUMNS.iter().position(|c| *c == required);
            if index.and_then(|i| slots[i]).is_none() {
                return Err(ImportError::MissingColumn(required));
            }
        }
        Ok(Self { slots })
    }

    fn cell<'a>(&self, row: &'a [String], column: &str) -> &'a str {
        COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.slots[i])
            .and_then(|i| row.get(i))
            .map_or("", String::as_str)
    }
}

impl Table {
    #[must_use]
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Convert cells to raw rows
    ///
    /// Blank rows are skipped. A non-integer `order` becomes a warning and
    /// the role sorts last.
    ///
    /// # Errors
    /// `MissingColumn` if `id` or `name` is not in the header
    pub fn into_rows(self, aliases: &DepartmentAliases) -> Result<RowBatch, ImportError> {
        let columns = ColumnMap::resolve(&self.header)?;
        let mut batch = RowBatch::default();

        for (i, cells) in self.rows.iter().enumerate() {
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            let line = i + 2;
            let cell = |column: &str| columns.cell(cells, column);

            let order_cell = cell("order").trim();
            let order = if order_cell.is_empty() {
                Role::UNORDERED
            } else if let Some(order) = parse_order(order_cell) {
                order
            } else {
                batch.findings.push(Finding::warning(
                    FindingKind::InvalidOrder {
                        raw: order_cell.to_string(),
                    },
                    Subject::Row { line },
                ));
                Role::UNORDERED
            };

            let department = non_blank(cell("department")).map(|d| aliases.canonical(&d));
            batch.rows.push(RawRow {
                line,
                id: non_blank(cell("id")),
                name: non_blank(cell("name")),
                photo: trimmed(cell("photo")),
                short_summary: trimmed(cell("shortSummary")),
                bio: trimmed(cell("bio")),
                achievements: split_achievements(cell("achievements")),
                role: RowRole::from_cells(department, non_blank(cell("position")), order),
            });
        }

        tracing::debug!(rows = batch.rows.len(), "parsed import table");
        Ok(batch)
    }
}

/// Integer order, accepting spreadsheet floats like `3.0`
fn parse_order(raw: &str) -> Option<i64> {
    if let Ok(order) = raw.parse::<i64>() {
        return Some(order);
    }
    let float = raw.parse::<f64>().ok()?;
    if float.fract() != 0.0 || float.abs() >= 1e15 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let order = float as i64;
    Some(order)
}

/// Split a `|`- or newline-delimited achievements cell
#[must_use]
pub fn split_achievements(raw: &str) -> Vec<String> {
    raw.split(['|', '\n'])
        .filter_map(non_blank)
        .collect()
}

fn trimmed(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| (*c).to_string()).collect()
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn missing_required_column_rejected() {
        let table = Table::new(header(&["id", "department"]), vec![]);
        assert_eq!(
            table.into_rows(&DepartmentAliases::new()),
            Err(ImportError::MissingColumn("name"))
        );
    }

    #[test]
    fn rows_keep_explicit_optional_fields() {
        let table = Table::new(
            header(&["name", "id", "department", "position", "order", "achievements", "extra"]),
            vec![
                cells(&["陈涛", "admin_001", "管理部", "创始人", "1", "金奖 | 银奖\n铜奖", "x"]),
                cells(&["", "", "", "", "", "", ""]),
                cells(&["王玉", "", "理论组教师", "", "", "", ""]),
            ],
        );
        let aliases = DepartmentAliases::new().with("理论组教师", "理论组");
        let batch = table.into_rows(&aliases).unwrap();

        assert_eq!(batch.rows.len(), 2);
        let first = &batch.rows[0];
        assert_eq!(first.line, 2);
        assert_eq!(first.id.as_deref(), Some("admin_001"));
        assert_eq!(first.achievements, vec!["金奖", "银奖", "铜奖"]);
        assert_eq!(first.role, RowRole::Complete(Role::new("管理部", "创始人", 1)));

        let second = &batch.rows[1];
        assert_eq!(second.line, 4);
        assert_eq!(second.id, None);
        assert_eq!(
            second.role,
            RowRole::Partial {
                department: Some("理论组".to_string()),
                position: None
            }
        );
    }

    #[test]
    fn bad_order_is_a_warning() {
        let table = Table::new(
            header(&["id", "name", "department", "position", "order"]),
            vec![
                cells(&["a_001", "x", "d", "p", "first"]),
                cells(&["a_002", "y", "d", "p", "3.0"]),
            ],
        );
        let batch = table.into_rows(&DepartmentAliases::new()).unwrap();
        assert_eq!(batch.findings.len(), 1);
        assert_eq!(batch.findings[0].subject, Subject::Row { line: 2 });
        assert_eq!(
            batch.rows[0].role,
            RowRole::Complete(Role::new("d", "p", Role::UNORDERED))
        );
        assert_eq!(batch.rows[1].role, RowRole::Complete(Role::new("d", "p", 3)));
    }

    #[test]
    fn builder_classifies_roles() {
        assert_eq!(RawRow::new(2).with_role(" ", "", None).role, RowRole::None);
        assert!(matches!(
            RawRow::new(2).with_role("管理部", "", Some(1)).role,
            RowRole::Partial { .. }
        ));
        assert!(RawRow::new(2).is_unidentified());
    }
}
