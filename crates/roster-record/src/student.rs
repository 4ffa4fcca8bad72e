//! Student (admission showcase) records

use crate::kind::{private, IncompletePart, MediaRef, RecordKind};
use crate::media::MediaPath;
use crate::person::blank_as_none;
use crate::text::norm_line;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Record kind for notable students
#[derive(Debug, Clone, Copy)]
pub struct Student;

/// A student as persisted in the students artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_as_none"
    )]
    pub photo: Option<String>,
    #[serde(default)]
    pub admissions: Vec<Admission>,
}

/// Admission letter screenshot attached to a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub watermarked: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl Admission {
    #[must_use]
    pub fn new(image: impl Into<String>, watermarked: bool) -> Self {
        Self {
            image: image.into(),
            watermarked,
            note: String::new(),
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

impl StudentRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        school: impl Into<String>,
        major: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            school: school.into(),
            major: major.into(),
            year: None,
            photo: None,
            admissions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Name and school recovered from a produced image file name
///
/// Batch tooling names its outputs `<name>__<school>__<anything>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameHint {
    pub name: String,
    pub school: Option<String>,
}

impl NameHint {
    /// Parse a hint from a file name; `None` if it does not follow the
    /// `<name>__<school>__...` convention
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let stem = Path::new(file_name).file_stem()?.to_str()?;
        let mut parts = stem.split("__");
        let name = norm_line(parts.next()?).replace(' ', "");
        let school = norm_line(parts.next()?);
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            school: (!school.is_empty()).then_some(school),
        })
    }
}

impl private::Sealed for Student {}

impl RecordKind for Student {
    type Record = StudentRecord;

    const KIND_ID: &'static str = "student";

    fn id(record: &StudentRecord) -> &str {
        &record.id
    }

    fn name(record: &StudentRecord) -> &str {
        &record.name
    }

    fn missing_fields(record: &StudentRecord) -> Vec<&'static str> {
        [
            ("id", record.id.as_str()),
            ("name", record.name.as_str()),
            ("school", record.school.as_str()),
            ("major", record.major.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    fn media_refs(record: &StudentRecord) -> Vec<MediaRef<'_>> {
        let photo = record.photo.as_deref().map(|path| MediaRef {
            field: "photo".to_string(),
            path,
        });
        let images = record
            .admissions
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.image.trim().is_empty())
            .map(|(i, a)| MediaRef {
                field: format!("admissions[{i}].image"),
                path: &a.image,
            });
        photo.into_iter().chain(images).collect()
    }

    fn incomplete_parts(record: &StudentRecord) -> Vec<IncompletePart> {
        record
            .admissions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.image.trim().is_empty())
            .map(|(index, _)| IncompletePart {
                field: "admissions",
                index,
                reason: "admission without image".to_string(),
            })
            .collect()
    }

    fn sanitize(record: &mut StudentRecord) -> Vec<IncompletePart> {
        let dropped = Self::incomplete_parts(record);
        record.admissions.retain(|a| !a.image.trim().is_empty());
        if let Some(photo) = record.photo.as_mut() {
            MediaPath::normalize(photo);
        }
        for admission in &mut record.admissions {
            MediaPath::normalize(&mut admission.image);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_include_school_and_major() {
        let s = StudentRecord::new("s_001", "张同学", "", " ");
        assert_eq!(Student::missing_fields(&s), vec!["school", "major"]);
    }

    #[test]
    fn media_refs_cover_photo_and_admissions() {
        let mut s = StudentRecord::new("s_001", "张同学", "中央音乐学院", "声乐表演");
        s.photo = Some("students/zhang.jpg".to_string());
        s.admissions.push(Admission::new("students/admissions/a.jpg", true));
        let refs = Student::media_refs(&s);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].field, "admissions[0].image");
    }

    #[test]
    fn sanitize_drops_imageless_admissions() {
        let mut s = StudentRecord::new("s_001", "张同学", "中央音乐学院", "声乐表演");
        s.admissions.push(Admission::new("", false));
        s.admissions.push(Admission::new("a.jpg", true));
        let dropped = Student::sanitize(&mut s);
        assert_eq!(dropped.len(), 1);
        assert_eq!(s.admissions.len(), 1);
    }

    #[test]
    fn sanitize_normalizes_admission_images() {
        let mut s = StudentRecord::new("s_001", "张同学", "中央音乐学院", "声乐表演");
        s.admissions.push(Admission::new("students\\admissions\\a.jpg", true));
        Student::sanitize(&mut s);
        assert_eq!(s.admissions[0].image, "students/admissions/a.jpg");
    }

    #[test]
    fn name_hint_from_file_name() {
        let hint = NameHint::from_file_name("张 三__中央音乐学院__01.jpg").unwrap();
        assert_eq!(hint.name, "张三");
        assert_eq!(hint.school.as_deref(), Some("中央音乐学院"));
        assert!(NameHint::from_file_name("plain.jpg").is_none());
        assert_eq!(NameHint::from_file_name("李四__.png").unwrap().school, None);
    }

    #[test]
    fn note_omitted_when_empty() {
        let json = serde_json::to_value(Admission::new("a.jpg", true)).unwrap();
        assert!(json.get("note").is_none());
    }
}
