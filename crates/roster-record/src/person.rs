//! Person records and their roles
//!
//! One person may hold several roles across departments (a founder who also
//! teaches voice). Roles are owned by their person and persisted inline.

use crate::kind::{private, DecodeError, IncompletePart, MediaRef, RecordKind};
use crate::media::MediaPath;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Record kind for people (teachers, staff)
#[derive(Debug, Clone, Copy)]
pub struct Person;

/// A person as persisted in the people artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_as_none"
    )]
    pub photo: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_as_none"
    )]
    pub short_summary: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_as_none"
    )]
    pub bio: Option<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Department/position pairing held by a person
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub position: String,
    /// Display precedence within the department (ascending)
    #[serde(default = "Role::unordered")]
    pub order: i64,
}

impl Role {
    /// Order given to roles that never specified one; sorts last
    pub const UNORDERED: i64 = 1_000_000_000;

    #[must_use]
    pub fn new(department: impl Into<String>, position: impl Into<String>, order: i64) -> Self {
        Self {
            department: department.into(),
            position: position.into(),
            order,
        }
    }

    fn unordered() -> i64 {
        Self::UNORDERED
    }

    /// Both department and position are set
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.department.trim().is_empty() && !self.position.trim().is_empty()
    }

    /// Same department and same position
    #[inline]
    #[must_use]
    pub fn same_slot(&self, other: &Role) -> bool {
        self.department == other.department && self.position == other.position
    }

    fn incompleteness(&self) -> Option<&'static str> {
        match (
            self.department.trim().is_empty(),
            self.position.trim().is_empty(),
        ) {
            (false, false) => None,
            (false, true) => Some("department without position"),
            (true, false) => Some("position without department"),
            (true, true) => Some("neither department nor position"),
        }
    }
}

impl PersonRecord {
    /// New record with no roles
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            photo: None,
            short_summary: None,
            bio: None,
            achievements: Vec::new(),
            roles: Vec::new(),
        }
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

    /// Add `role` unless an identical department/position is already held
    ///
    /// On a duplicate the held role keeps the smaller of both orders.
    /// Returns `true` if the role was appended.
    pub fn ensure_role(&mut self, role: Role) -> bool {
        if let Some(held) = self.roles.iter_mut().find(|r| r.same_slot(&role)) {
            held.order = held.order.min(role.order);
            return false;
        }
        self.roles.push(role);
        true
    }

    /// Append an achievement unless the exact text is already listed
    pub fn ensure_achievement(&mut self, achievement: impl Into<String>) -> bool {
        let achievement = achievement.into();
        if self.achievements.contains(&achievement) {
            return false;
        }
        self.achievements.push(achievement);
        true
    }

    /// Smallest role order, `Role::UNORDERED` for a person with no roles
    #[must_use]
    pub fn min_order(&self) -> i64 {
        self.roles
            .iter()
            .map(|r| r.order)
            .min()
            .unwrap_or(Role::UNORDERED)
    }

    /// Order for a role appended after every role the person holds
    #[must_use]
    pub fn next_order(&self) -> i64 {
        self.roles
            .iter()
            .map(|r| r.order)
            .filter(|o| *o < Role::UNORDERED)
            .max()
            .map_or(1, |o| o + 1)
    }

    #[must_use]
    pub fn holds_department(&self, department: &str) -> bool {
        self.roles.iter().any(|r| r.department == department)
    }
}

impl private::Sealed for Person {}

impl RecordKind for Person {
    type Record = PersonRecord;

    const KIND_ID: &'static str = "person";

    fn id(record: &PersonRecord) -> &str {
        &record.id
    }

    fn name(record: &PersonRecord) -> &str {
        &record.name
    }

    fn media_refs(record: &PersonRecord) -> Vec<MediaRef<'_>> {
        record
            .photo
            .as_deref()
            .map(|path| MediaRef {
                field: "photo".to_string(),
                path,
            })
            .into_iter()
            .collect()
    }

    fn incomplete_parts(record: &PersonRecord) -> Vec<IncompletePart> {
        record
            .roles
            .iter()
            .enumerate()
            .filter_map(|(index, role)| {
                role.incompleteness().map(|reason| IncompletePart {
                    field: "roles",
                    index,
                    reason: reason.to_string(),
                })
            })
            .collect()
    }

    fn sanitize(record: &mut PersonRecord) -> Vec<IncompletePart> {
        let dropped = Self::incomplete_parts(record);
        record.roles.retain(Role::is_complete);
        if let Some(photo) = record.photo.as_mut() {
            MediaPath::normalize(photo);
        }
        dropped
    }

    /// Decodes both the role-list format and the legacy flat format
    ///
    /// A legacy element has no `roles` key and carries `department` /
    /// `position` at the top level; it becomes a person with one role whose
    /// order is its position in the file.
    fn decode(bytes: &[u8]) -> Result<Vec<PersonRecord>, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Array(items) = value else {
            return Err(DecodeError::NotAnArray);
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) if map.contains_key("roles") => {
                    Ok(serde_json::from_value(Value::Object(map))?)
                }
                Value::Object(map) => upgrade_legacy(index, map),
                _ => Err(DecodeError::NotAnObject { index }),
            })
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPerson {
    #[serde(default, deserialize_with = "blank_as_none")]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    photo: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    short_summary: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    bio: Option<String>,
    #[serde(default)]
    achievements: Vec<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    department: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    position: Option<String>,
}

fn upgrade_legacy(index: usize, map: Map<String, Value>) -> Result<PersonRecord, DecodeError> {
    let legacy: LegacyPerson = serde_json::from_value(Value::Object(map))?;
    let id = legacy
        .id
        .unwrap_or_else(|| format!("legacy_{:03}", index + 1));
    tracing::debug!(%id, index, "upgrading legacy flat person record");

    let mut roles = Vec::new();
    if legacy.department.is_some() || legacy.position.is_some() {
        let order = i64::try_from(index + 1).unwrap_or(Role::UNORDERED);
        roles.push(Role::new(
            legacy.department.unwrap_or_default(),
            legacy.position.unwrap_or_default(),
            order,
        ));
    }

    Ok(PersonRecord {
        id,
        name: legacy.name,
        photo: legacy.photo,
        short_summary: legacy.short_summary,
        bio: legacy.bio,
        achievements: legacy.achievements,
        roles,
    })
}

/// Read an optional string, treating `""` and `null` as absent
pub(crate) fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ensure_role_dedupes_and_keeps_min_order() {
        let mut p = PersonRecord::new("admin_001", "陈涛");
        assert!(p.ensure_role(Role::new("管理部", "创始人", 5)));
        assert!(!p.ensure_role(Role::new("管理部", "创始人", 2)));
        assert!(p.ensure_role(Role::new("声乐组", "声乐教师", 20)));
        assert_eq!(p.roles.len(), 2);
        assert_eq!(p.roles[0].order, 2);
    }

    #[test]
    fn next_order_skips_unordered() {
        let mut p = PersonRecord::new("a_001", "x");
        assert_eq!(p.next_order(), 1);
        p.roles.push(Role::new("d", "p", Role::UNORDERED));
        assert_eq!(p.next_order(), 1);
        p.roles.push(Role::new("d", "q", 7));
        assert_eq!(p.next_order(), 8);
    }

    #[test]
    fn sanitize_drops_half_roles() {
        let mut p = PersonRecord::new("a_001", "x")
            .with_role(Role::new("管理部", "创始人", 1))
            .with_role(Role::new("管理部", "", 2))
            .with_role(Role::new("", "", 3));
        let dropped = Person::sanitize(&mut p);
        assert_eq!(dropped.len(), 2);
        assert_eq!(dropped[0].index, 1);
        assert_eq!(dropped[0].reason, "department without position");
        assert_eq!(p.roles, vec![Role::new("管理部", "创始人", 1)]);
    }

    #[test]
    fn sanitize_normalizes_photo_path() {
        let mut p = PersonRecord::new("a_001", "x").with_photo(" images\\teachers\\x.jpg");
        Person::sanitize(&mut p);
        assert_eq!(p.photo.as_deref(), Some("images/teachers/x.jpg"));
    }

    #[test]
    fn serializes_camel_case_and_omits_absent() {
        let mut p = PersonRecord::new("a_001", "王玉");
        p.short_summary = Some("summary".to_string());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["shortSummary"], "summary");
        assert!(json.get("photo").is_none());
        assert_eq!(json["roles"], serde_json::json!([]));
    }

    #[test]
    fn decode_fills_defaults() {
        let raw = br#"[{"id":"a_001","name":"x","photo":"","roles":[{"department":"d","position":"p"}]}]"#;
        let records = Person::decode(raw).unwrap();
        assert_eq!(records[0].photo, None);
        assert!(records[0].achievements.is_empty());
        assert_eq!(records[0].roles[0].order, Role::UNORDERED);
    }

    #[test]
    fn decode_upgrades_legacy_records() {
        let raw = r#"[
            {"id":"chen_tao","name":"陈涛","department":"管理部","position":"创始人","bio":"b"},
            {"name":"王玉","department":"管理部","position":"校长"},
            {"name":"无岗位"}
        ]"#;
        let records = Person::decode(raw.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].roles, vec![Role::new("管理部", "创始人", 1)]);
        assert_eq!(records[0].bio.as_deref(), Some("b"));
        assert_eq!(records[1].id, "legacy_002");
        assert_eq!(records[1].roles[0].order, 2);
        assert!(records[2].roles.is_empty());
    }

    #[test]
    fn decode_rejects_non_array() {
        assert!(matches!(Person::decode(b"{}"), Err(DecodeError::NotAnArray)));
        assert!(matches!(
            Person::decode(b"[1]"),
            Err(DecodeError::NotAnObject { index: 0 })
        ));
    }
}
