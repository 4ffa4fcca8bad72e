//! Property tests over sequences of operations.
//!
//! Whatever mix of operations is accepted, ids stay unique and every
//! persisted role is complete; re-importing a source changes nothing; a
//! rejected operation leaves the artifact byte-identical.

use proptest::prelude::*;
use roster_core::{ImportMode, ImportSource, NewPerson, Operation, Registry};
use roster_merge::RawRow;
use roster_record::{Identity, Person};
use roster_store::{FsSnapshotStore, LocalBackend};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

fn registry(dir: &Path) -> Registry<Person, LocalBackend> {
    Registry::new(
        LocalBackend::new(dir.join("teachers.json")),
        Arc::new(FsSnapshotStore::new(dir.join("backups"))),
        "teachers.json",
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    let name = prop::sample::select(vec!["陈涛", "王玉", "韩刚", "李四"]);
    let explicit_id = prop::option::of(prop::sample::select(vec!["vocal_001", "vocal_002", "admin_001"]));
    let department = prop::sample::select(vec!["", "管理部", "声乐组"]);
    let position = prop::sample::select(vec!["", "校长", "声乐教师"]);

    prop_oneof![
        (name.clone(), explicit_id).prop_map(|(name, id)| {
            let mut new = NewPerson::named(name).with_prefix("vocal");
            new.id = id.map(str::to_string);
            Operation::AddPerson(new)
        }),
        (name.clone(), department, position, prop::option::of(0i64..10)).prop_map(
            |(name, department, position, order)| Operation::AddRole {
                identity: Identity::name(name),
                department: department.to_string(),
                position: position.to_string(),
                order,
            }
        ),
        (name.clone(), 1usize..4).prop_map(|(name, index)| Operation::RemoveRole {
            identity: Identity::name(name),
            index,
        }),
        name.prop_map(|name| Operation::Remove {
            identity: Identity::name(name),
        }),
    ]
}

fn arb_row() -> impl Strategy<Value = RawRow> {
    let id = prop::option::of(prop::sample::select(vec!["a_001", "a_002"]));
    let name = prop::sample::select(vec!["陈涛", "王玉", "韩刚"]);
    let department = prop::sample::select(vec!["", "管理部", "声乐组"]);
    let position = prop::sample::select(vec!["", "教师", "组长"]);
    (id, name, department, position).prop_map(|(id, name, department, position)| {
        let row = RawRow::new(2).with_name(name).with_role(department, position, None);
        match id {
            Some(id) => row.with_id(id),
            None => row,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn accepted_operations_keep_ids_unique_and_roles_paired(
        operations in prop::collection::vec(arb_operation(), 1..12)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let people = registry(dir.path());
        let path = dir.path().join("teachers.json");

        runtime().block_on(async {
            for operation in operations {
                let before = std::fs::read(&path).ok();
                if let Err(err) = people.execute(operation).await {
                    prop_assert!(err.is_fatal());
                    prop_assert_eq!(std::fs::read(&path).ok(), before);
                }
            }

            let (after, _) = people.read().await.unwrap();
            let mut seen = HashSet::new();
            for record in after.records() {
                prop_assert!(seen.insert(record.id.clone()), "duplicate id {}", record.id);
                for role in &record.roles {
                    prop_assert!(!role.department.trim().is_empty());
                    prop_assert!(!role.position.trim().is_empty());
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn second_import_of_same_rows_changes_nothing(
        rows in prop::collection::vec(arb_row(), 1..15)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let people = registry(dir.path());
        let import = || Operation::SyncFromSource {
            source: ImportSource::Rows(rows.clone()),
            mode: ImportMode::Merge,
            dry_run: false,
        };

        runtime().block_on(async {
            people.execute(import()).await.unwrap();
            let (first, _) = people.read().await.unwrap();

            let second = people.execute(import()).await.unwrap();
            prop_assert!(!second.outcome().unwrap().changed);
            let (again, _) = people.read().await.unwrap();
            prop_assert_eq!(again, first);
            Ok(())
        })?;
    }
}
