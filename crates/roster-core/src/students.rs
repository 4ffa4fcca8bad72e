//! Student operations
//!
//! Same pipeline as people, with admissions in place of roles.

use crate::error::RosterError;
use crate::operation::{
    AdmissionBatch, AdmissionSummary, NewStudent, Response, StudentEdit, StudentOperation,
};
use crate::registry::{locate, optional_text, Defaults, Proposal, Registry};
use roster_record::text::{non_blank, norm_line};
use roster_record::{
    allocate, Admission, Collection, Identity, IdentityAllocator, MediaPath, NameHint, Student,
    StudentRecord,
};
use roster_store::StorageBackend;

type Students = Collection<Student>;

impl<B: StorageBackend> Registry<Student, B> {
    /// Execute one student operation
    ///
    /// # Errors
    /// See [`RosterError`]; read-only operations only fail on store errors
    pub async fn execute(
        &self,
        operation: StudentOperation,
    ) -> Result<Response<Student>, RosterError> {
        let defaults = self.defaults().clone();
        tracing::debug!(?operation, "executing");

        let outcome = match operation {
            StudentOperation::List { school } => {
                let (students, _) = self.read().await?;
                return Ok(Response::Listing(list(students, school.as_deref())));
            }
            StudentOperation::Validate => return Ok(Response::Validated(self.check().await?)),
            StudentOperation::RecordAdmissions(batch) => {
                let mut summary = AdmissionSummary::default();
                let outcome = self
                    .commit(false, |students| {
                        let (proposal, counts) = record_admissions(students, &defaults, batch)?;
                        summary = counts;
                        Ok(proposal)
                    })
                    .await?;
                return Ok(Response::AdmissionsRecorded { outcome, summary });
            }
            StudentOperation::AddStudent(new) => {
                self.commit(false, |students| add_student(students, &defaults, new))
                    .await?
            }
            StudentOperation::AddAdmission {
                identity,
                admission,
            } => {
                self.commit(false, |students| add_admission(students, &identity, admission))
                    .await?
            }
            StudentOperation::EditStudent { identity, edit } => {
                self.commit(false, |students| edit_student(students, &identity, edit))
                    .await?
            }
            StudentOperation::RemoveAdmission { identity, index } => {
                self.commit(false, |students| remove_admission(students, &identity, index))
                    .await?
            }
            StudentOperation::Remove { identity } => {
                self.commit(false, |students| remove(students, &identity))
                    .await?
            }
        };
        Ok(Response::Changed(outcome))
    }
}

fn list(students: Students, school: Option<&str>) -> Students {
    match school.map(norm_line) {
        None => students,
        Some(school) => Collection::new(
            students
                .into_records()
                .into_iter()
                .filter(|s| s.school == school)
                .collect(),
        ),
    }
}

pub(crate) fn add_student(
    mut students: Students,
    defaults: &Defaults,
    new: NewStudent,
) -> Result<Proposal<Student>, RosterError> {
    let id = match new.id.as_deref().and_then(non_blank) {
        Some(id) => id,
        None => allocate(&defaults.student_prefix, students.ids())?,
    };
    let mut record = StudentRecord::new(
        id,
        norm_line(&new.name),
        norm_line(&new.school),
        norm_line(&new.major),
    );
    record.year = new.year;
    record.photo = new.photo.as_deref().and_then(optional_text);

    let summary = format!(
        "add student {} / {} / {} ({})",
        record.name, record.school, record.major, record.id
    );
    students.push(record);
    Ok(Proposal::new(students, summary))
}

pub(crate) fn add_admission(
    mut students: Students,
    identity: &Identity,
    admission: Admission,
) -> Result<Proposal<Student>, RosterError> {
    let index = locate(&students, identity)?;
    let record = &mut students.records_mut()[index];
    let admission = Admission {
        image: admission.image.trim().to_string(),
        watermarked: admission.watermarked,
        note: norm_line(&admission.note),
    };
    let summary = format!(
        "add admission {} to {} ({})",
        admission.image, record.name, record.id
    );
    record.admissions.push(admission);
    Ok(Proposal::new(students, summary))
}

pub(crate) fn edit_student(
    mut students: Students,
    identity: &Identity,
    edit: StudentEdit,
) -> Result<Proposal<Student>, RosterError> {
    let index = locate(&students, identity)?;
    let record = &mut students.records_mut()[index];

    let mut fields = Vec::new();
    for (field, slot, value) in [
        ("name", &mut record.name, edit.name),
        ("school", &mut record.school, edit.school),
        ("major", &mut record.major, edit.major),
    ] {
        if let Some(value) = value {
            *slot = norm_line(&value);
            fields.push(field);
        }
    }
    if let Some(year) = edit.year {
        record.year = Some(year);
        fields.push("year");
    }
    if let Some(photo) = edit.photo {
        record.photo = optional_text(&photo);
        fields.push("photo");
    }

    let summary = format!("edit {} ({}): {}", record.name, record.id, fields.join(", "));
    Ok(Proposal::new(students, summary))
}

pub(crate) fn remove_admission(
    mut students: Students,
    identity: &Identity,
    index: usize,
) -> Result<Proposal<Student>, RosterError> {
    let position = locate(&students, identity)?;
    let record = &mut students.records_mut()[position];
    if index == 0 || index > record.admissions.len() {
        return Err(RosterError::AdmissionIndexOutOfRange {
            identity: identity.clone(),
            index,
            len: record.admissions.len(),
        });
    }
    let removed = record.admissions.remove(index - 1);
    let summary = format!(
        "remove admission #{index} {} from {} ({})",
        removed.image, record.name, record.id
    );
    Ok(Proposal::new(students, summary))
}

pub(crate) fn remove(
    mut students: Students,
    identity: &Identity,
) -> Result<Proposal<Student>, RosterError> {
    let position = locate(&students, identity)?;
    let removed = students.records_mut().remove(position);
    let summary = format!("remove student {} ({})", removed.name, removed.id);
    Ok(Proposal::new(students, summary))
}

/// Attach a batch of produced images to the students they name
///
/// Each entry's file name is parsed as `<name>__<school>__...`. The first
/// student with that exact name receives the admission; an image already
/// attached to that student is skipped so a re-run adds nothing.
pub(crate) fn record_admissions(
    mut students: Students,
    defaults: &Defaults,
    batch: AdmissionBatch,
) -> Result<(Proposal<Student>, AdmissionSummary), RosterError> {
    let mut allocator = IdentityAllocator::scan(&defaults.student_prefix, students.ids())?;
    let note = batch.note.as_deref().map(norm_line).unwrap_or_default();
    let mut summary = AdmissionSummary {
        entries: batch.entries.len(),
        ..AdmissionSummary::default()
    };

    for entry in batch.entries {
        let image = entry.image.trim().to_string();
        let file_name = MediaPath::parse(&image).map_or_else(
            |_| image.rsplit(['/', '\\']).next().unwrap_or(image.as_str()).to_string(),
            |path| path.file_name().to_string(),
        );
        let Some(hint) = NameHint::from_file_name(&file_name) else {
            tracing::warn!(%image, "image name does not follow <name>__<school>__*; skipped");
            summary.skipped.push(image);
            continue;
        };

        let index = match students.position(&Identity::name(hint.name.as_str())) {
            Some(index) => index,
            None if batch.create_missing => {
                let mut record = StudentRecord::new(
                    allocator.next_id()?,
                    hint.name,
                    hint.school.unwrap_or_default(),
                    batch.major.as_deref().map(norm_line).unwrap_or_default(),
                );
                record.year = batch.year;
                tracing::info!(id = %record.id, name = %record.name, "creating student for admission image");
                students.push(record);
                summary.created += 1;
                students.len() - 1
            }
            None => {
                tracing::warn!(%image, name = %hint.name, "no student with this name; skipped");
                summary.skipped.push(image);
                continue;
            }
        };

        let record = &mut students.records_mut()[index];
        if record.admissions.iter().any(|a| a.image == image) {
            summary.skipped.push(image);
            continue;
        }
        record.admissions.push(Admission {
            image,
            watermarked: entry.watermarked,
            note: note.clone(),
        });
        summary.attached += 1;
    }

    let message = format!(
        "record admissions: {} entries, {} attached, {} students created",
        summary.entries, summary.attached, summary.created
    );
    Ok((Proposal::new(students, message), summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::AdmissionEntry;
    use pretty_assertions::assert_eq;

    fn students() -> Students {
        Collection::new(vec![
            StudentRecord::new("student_001", "张三", "中央音乐学院", "声乐表演").with_year(2024),
            StudentRecord::new("student_002", "李四", "上海音乐学院", "音乐学"),
        ])
    }

    #[test]
    fn add_student_allocates_from_student_prefix() {
        let proposal = add_student(
            students(),
            &Defaults::default(),
            NewStudent {
                name: "王五".to_string(),
                school: "西安音乐学院".to_string(),
                major: "作曲".to_string(),
                year: Some(2025),
                ..NewStudent::default()
            },
        )
        .unwrap();
        let added = proposal.collection.records().last().unwrap();
        assert_eq!(added.id, "student_003");
        assert_eq!(added.year, Some(2025));
    }

    #[test]
    fn remove_admission_checks_index() {
        let mut s = students();
        s.records_mut()[0]
            .admissions
            .push(Admission::new("students/a.jpg", true));
        let err = remove_admission(s.clone(), &Identity::name("张三"), 2).unwrap_err();
        assert!(matches!(
            err,
            RosterError::AdmissionIndexOutOfRange { index: 2, len: 1, .. }
        ));

        let proposal = remove_admission(s, &Identity::name("张三"), 1).unwrap();
        assert!(proposal.collection.records()[0].admissions.is_empty());
    }

    #[test]
    fn edit_student_sets_fields() {
        let proposal = edit_student(
            students(),
            &Identity::id("student_002"),
            StudentEdit {
                major: Some(" 音乐 教育 ".to_string()),
                year: Some(2023),
                ..StudentEdit::default()
            },
        )
        .unwrap();
        let record = &proposal.collection.records()[1];
        assert_eq!(record.major, "音乐 教育");
        assert_eq!(record.year, Some(2023));
        assert_eq!(proposal.summary, "edit 李四 (student_002): major, year");
    }

    #[test]
    fn record_admissions_attaches_creates_and_skips() {
        let batch = AdmissionBatch {
            entries: vec![
                AdmissionEntry::watermarked("images/admissions/张三__中央音乐学院__01.jpg"),
                AdmissionEntry::watermarked("images/admissions/赵六__星海音乐学院__01.jpg"),
                AdmissionEntry::watermarked("images/admissions/plain.jpg"),
            ],
            create_missing: true,
            major: None,
            year: Some(2025),
            note: Some("2025 录取".to_string()),
        };
        let (proposal, summary) = record_admissions(students(), &Defaults::default(), batch).unwrap();

        assert_eq!(summary.attached, 2);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, vec!["images/admissions/plain.jpg"]);

        let created = &proposal.collection.records()[2];
        assert_eq!(created.id, "student_003");
        assert_eq!(created.school, "星海音乐学院");
        assert_eq!(created.major, "");
        assert_eq!(created.year, Some(2025));
        assert_eq!(created.admissions[0].note, "2025 录取");
    }

    #[test]
    fn record_admissions_is_idempotent() {
        let batch = AdmissionBatch {
            entries: vec![AdmissionEntry::watermarked("a/张三__中央音乐学院__01.jpg")],
            ..AdmissionBatch::default()
        };
        let (first, _) = record_admissions(students(), &Defaults::default(), batch.clone()).unwrap();
        let (second, summary) =
            record_admissions(first.collection.clone(), &Defaults::default(), batch).unwrap();
        assert_eq!(second.collection, first.collection);
        assert_eq!(summary.attached, 0);
    }

    #[test]
    fn unmatched_without_create_is_skipped() {
        let batch = AdmissionBatch {
            entries: vec![AdmissionEntry::watermarked("a/无名__某校__01.jpg")],
            ..AdmissionBatch::default()
        };
        let (proposal, summary) = record_admissions(students(), &Defaults::default(), batch).unwrap();
        assert_eq!(proposal.collection, students());
        assert_eq!(summary.skipped.len(), 1);
    }

    #[test]
    fn list_filters_by_school() {
        let listed = list(students(), Some("上海音乐学院"));
        assert_eq!(listed.ids().collect::<Vec<_>>(), vec!["student_002"]);
    }
}
