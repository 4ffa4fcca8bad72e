//! Human and JSON output

use roster_core::{Outcome, Response};
use roster_merge::Finding;
use roster_record::{Collection, Person, PersonRecord, RecordKind, Student, StudentRecord};
use roster_store::Snapshot;
use serde_json::{json, Value};
use std::fmt::Write;

/// Records that know how to print themselves in a listing
pub(crate) trait Listing: RecordKind {
    fn entry(record: &Self::Record) -> String;
}

impl Listing for Person {
    fn entry(record: &PersonRecord) -> String {
        let mut out = format!("{}  {}", record.id, record.name);
        if let Some(summary) = &record.short_summary {
            let _ = write!(out, "  ({summary})");
        }
        // numbering follows stored position, which is what edit-role and remove-role take
        for (n, role) in record.roles.iter().enumerate() {
            let _ = write!(
                out,
                "\n    {}. {} / {}  [order {}]",
                n + 1,
                role.department,
                role.position,
                role.order
            );
        }
        out
    }
}

impl Listing for Student {
    fn entry(record: &StudentRecord) -> String {
        let mut out = format!(
            "{}  {}  {} / {}",
            record.id, record.name, record.school, record.major
        );
        if let Some(year) = record.year {
            let _ = write!(out, "  {year}");
        }
        for (n, admission) in record.admissions.iter().enumerate() {
            let _ = write!(out, "\n    {}. {}", n + 1, admission.image);
            if !admission.watermarked {
                out.push_str("  (no watermark)");
            }
            if !admission.note.is_empty() {
                let _ = write!(out, "  {}", admission.note);
            }
        }
        out
    }
}

fn listing<K: Listing>(collection: &Collection<K>) -> String {
    if collection.is_empty() {
        return "(no records)".to_string();
    }
    collection
        .iter()
        .map(K::entry)
        .collect::<Vec<_>>()
        .join("\n")
}

fn findings(out: &mut String, heading: &str, items: &[&Finding]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n{heading}:");
    for finding in items {
        let _ = write!(out, "\n  - {finding}");
    }
}

fn outcome_text<K: RecordKind>(outcome: &Outcome<K>) -> String {
    let status = if outcome.dry_run {
        if outcome.changed {
            "dry run, would commit"
        } else {
            "dry run, nothing to change"
        }
    } else if outcome.changed {
        "committed"
    } else {
        "unchanged"
    };
    let mut out = format!("{}: {status}", outcome.summary);
    if let Some(snapshot) = &outcome.snapshot {
        let _ = write!(out, "\nbackup: {}", snapshot.id);
    }
    out
}

/// Plain text rendering of a response
pub(crate) fn text<K: Listing>(response: &Response<K>) -> String {
    let mut out = match response {
        Response::Listing(collection) => listing(collection),
        Response::Validated(report) if report.is_empty() => "no findings".to_string(),
        Response::Validated(report) => {
            let fatal: Vec<&Finding> = report.fatal().collect();
            let mut out = format!("{} finding(s)", report.len());
            findings(&mut out, "errors", &fatal);
            out
        }
        Response::Changed(outcome) => outcome_text(outcome),
        Response::Imported { outcome, summary } => format!(
            "{}\n{} row(s) into {} record(s): {} created, {} updated",
            outcome_text(outcome),
            summary.rows,
            summary.records,
            summary.created,
            summary.updated
        ),
        Response::AdmissionsRecorded { outcome, summary } => {
            let mut out = format!(
                "{}\n{} image(s): {} attached, {} student(s) created",
                outcome_text(outcome),
                summary.entries,
                summary.attached,
                summary.created
            );
            for skipped in &summary.skipped {
                let _ = write!(out, "\n  skipped {skipped}");
            }
            out
        }
    };
    findings(&mut out, "warnings", &response.warnings());
    out
}

fn outcome_json<K: RecordKind>(outcome: &Outcome<K>) -> Value {
    json!({
        "summary": outcome.summary,
        "changed": outcome.changed,
        "committed": outcome.committed(),
        "dryRun": outcome.dry_run,
        "fingerprint": outcome.fingerprint.to_string(),
        "backup": outcome.snapshot.as_ref().map(|s| s.id.clone()),
        "warnings": outcome.warnings,
    })
}

/// JSON rendering of a response
pub(crate) fn json<K: RecordKind>(response: &Response<K>) -> Value {
    match response {
        Response::Listing(collection) => json!({ "records": collection.records() }),
        Response::Validated(report) => json!({
            "accepted": report.is_accepted(),
            "findings": report.findings(),
        }),
        Response::Changed(outcome) => outcome_json(outcome),
        Response::Imported { outcome, summary } => {
            let mut value = outcome_json(outcome);
            value["import"] = json!({
                "rows": summary.rows,
                "records": summary.records,
                "created": summary.created,
                "updated": summary.updated,
            });
            value
        }
        Response::AdmissionsRecorded { outcome, summary } => {
            let mut value = outcome_json(outcome);
            value["admissions"] = json!({
                "entries": summary.entries,
                "attached": summary.attached,
                "created": summary.created,
                "skipped": summary.skipped,
            });
            value
        }
    }
}

pub(crate) fn snapshots(label: &str, snapshots: &[Snapshot], as_json: bool) -> String {
    if as_json {
        let items: Vec<Value> = snapshots
            .iter()
            .map(|s| json!({ "id": s.id, "takenAt": s.taken_at.to_string() }))
            .collect();
        return json!({ "label": label, "snapshots": items }).to_string();
    }
    if snapshots.is_empty() {
        return format!("no backups of {label}");
    }
    snapshots
        .iter()
        .map(|s| format!("{}  {}", s.taken_at, s.id))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roster_merge::Report;
    use roster_test_utils::sample_people;

    #[test]
    fn roles_numbered_from_one() {
        let people = sample_people();
        let out = text(&Response::Listing(people));
        let founder: Vec<&str> = out.lines().take(4).collect();
        assert_eq!(
            founder,
            vec![
                "admin_001  陈涛",
                "    1. 管理部 / 创始人  [order 1]",
                "    2. 声乐组 / 声乐教师  [order 2]",
                "    3. 理论组 / 乐理教师  [order 3]",
            ]
        );
    }

    #[test]
    fn empty_report() {
        let response: Response<Person> = Response::Validated(Report::new());
        assert_eq!(text(&response), "no findings");
        assert_eq!(json(&response)["accepted"], Value::Bool(true));
    }

    #[test]
    fn no_backups() {
        assert_eq!(snapshots("teachers.json", &[], false), "no backups of teachers.json");
    }
}
