//! Argument definitions and their translation into operations

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use roster_core::{
    table_from_json, AdmissionBatch, AdmissionEntry, ImportMode, ImportSource, NewPerson,
    NewStudent, Operation, PersonEdit, Reorder, RoleEdit, StudentEdit, StudentOperation,
    CONFIG_FILE,
};
use roster_record::{Admission, Identity, Role};
use std::path::PathBuf;

/// What the user asked for
#[derive(Debug)]
pub(crate) enum Request {
    Config,
    People(Operation),
    Students(StudentOperation),
    Snapshots { label: String },
}

/// Global flags plus the request
#[derive(Debug)]
pub(crate) struct Invocation {
    pub(crate) config: PathBuf,
    pub(crate) json: bool,
    pub(crate) request: Request,
}

fn identity_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("id").long("id").help("Record id"))
        .arg(Arg::new("name").long("name").help("Exact record name"))
        .group(ArgGroup::new("identity").args(["id", "name"]).required(true))
}

fn index_arg(help: &'static str) -> Arg {
    Arg::new("index")
        .long("index")
        .required(true)
        .value_parser(value_parser!(usize))
        .help(help)
}

fn text(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn people_command() -> Command {
    Command::new("people")
        .about("Teacher and staff records")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List people with numbered roles")
                .arg(text("department", "Only people holding a role in this department")),
        )
        .subcommand(Command::new("validate").about("Validate the stored collection"))
        .subcommand(
            Command::new("add")
                .about("Add a person")
                .arg(text("name", "Display name").required(true))
                .arg(text("id", "Explicit id (rejected if taken)"))
                .arg(text("prefix", "Category prefix for the allocated id"))
                .arg(text("photo", "Photo path relative to the site root"))
                .arg(text("summary", "Short summary"))
                .arg(text("bio", "Biography"))
                .arg(
                    Arg::new("achievement")
                        .long("achievement")
                        .action(ArgAction::Append)
                        .help("Achievement (repeatable)"),
                )
                .arg(text("department", "Department of an initial role"))
                .arg(text("position", "Position of an initial role"))
                .arg(
                    Arg::new("order")
                        .long("order")
                        .value_parser(value_parser!(i64))
                        .help("Order of the initial role"),
                ),
        )
        .subcommand(identity_args(
            Command::new("add-role")
                .about("Add a role to a person")
                .arg(text("department", "Department").required(true))
                .arg(text("position", "Position").required(true))
                .arg(
                    Arg::new("order")
                        .long("order")
                        .value_parser(value_parser!(i64))
                        .help("Display order (default: after the highest)"),
                ),
        ))
        .subcommand(identity_args(
            Command::new("edit")
                .about("Edit person fields; an empty value clears a text field")
                .arg(text("set-name", "New display name"))
                .arg(text("photo", "Photo path"))
                .arg(text("summary", "Short summary"))
                .arg(text("bio", "Biography"))
                .arg(
                    Arg::new("append-achievement")
                        .long("append-achievement")
                        .action(ArgAction::Append)
                        .help("Achievement to append (repeatable)"),
                )
                .arg(
                    Arg::new("clear-achievements")
                        .long("clear-achievements")
                        .action(ArgAction::SetTrue)
                        .help("Remove all achievements first"),
                ),
        ))
        .subcommand(identity_args(
            Command::new("edit-role")
                .about("Edit one role")
                .arg(index_arg("1-based role number as shown by list"))
                .arg(text("department", "Department"))
                .arg(text("position", "Position"))
                .arg(
                    Arg::new("order")
                        .long("order")
                        .value_parser(value_parser!(i64))
                        .help("Display order"),
                ),
        ))
        .subcommand(identity_args(
            Command::new("remove-role")
                .about("Remove one role; the person is kept")
                .arg(index_arg("1-based role number as shown by list")),
        ))
        .subcommand(identity_args(
            Command::new("remove").about("Remove a person and all roles"),
        ))
        .subcommand(
            Command::new("import")
                .about("Import rows from a JSON table")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Array of row objects, or {header, rows}"),
                )
                .arg(
                    Arg::new("replace")
                        .long("replace")
                        .action(ArgAction::SetTrue)
                        .help("Replace matching records instead of merging"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Validate and report without writing"),
                ),
        )
        .subcommand(
            Command::new("reorder")
                .about("Reorder the collection")
                .arg(Arg::new("id").long("id").help("Record id to move"))
                .arg(Arg::new("name").long("name").help("Exact name of the record to move"))
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_parser(value_parser!(usize))
                        .requires("identity")
                        .help("1-based target position"),
                )
                .group(ArgGroup::new("identity").args(["id", "name"]).requires("to"))
                .arg(
                    Arg::new("department")
                        .long("department")
                        .conflicts_with("identity")
                        .help("Re-rank the roles of this department"),
                )
                .arg(
                    Arg::new("role")
                        .long("role")
                        .action(ArgAction::Append)
                        .requires("department")
                        .value_parser(parse_ranked_role)
                        .help("<id>:<role number> in the wanted order (repeatable)"),
                ),
        )
}

fn students_command() -> Command {
    Command::new("students")
        .about("Notable student records")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List students")
                .arg(text("school", "Only students of this school")),
        )
        .subcommand(Command::new("validate").about("Validate the stored collection"))
        .subcommand(
            Command::new("add")
                .about("Add a student")
                .arg(text("name", "Name").required(true))
                .arg(text("school", "School").required(true))
                .arg(text("major", "Major").required(true))
                .arg(Arg::new("year").long("year").value_parser(value_parser!(i32)))
                .arg(text("photo", "Photo path"))
                .arg(text("id", "Explicit id")),
        )
        .subcommand(identity_args(
            Command::new("add-admission")
                .about("Attach an admission image")
                .arg(text("image", "Image path").required(true))
                .arg(
                    Arg::new("watermarked")
                        .long("watermarked")
                        .action(ArgAction::SetTrue),
                )
                .arg(text("note", "Note")),
        ))
        .subcommand(identity_args(
            Command::new("edit")
                .about("Edit student fields")
                .arg(text("set-name", "New name"))
                .arg(text("school", "School"))
                .arg(text("major", "Major"))
                .arg(Arg::new("year").long("year").value_parser(value_parser!(i32)))
                .arg(text("photo", "Photo path; empty clears")),
        ))
        .subcommand(identity_args(
            Command::new("remove-admission")
                .about("Remove one admission")
                .arg(index_arg("1-based admission number")),
        ))
        .subcommand(identity_args(Command::new("remove").about("Remove a student")))
        .subcommand(
            Command::new("record-admissions")
                .about("Attach produced images named <name>__<school>__*.jpg in one commit")
                .arg(
                    Arg::new("image")
                        .required(true)
                        .num_args(1..)
                        .help("Image paths relative to the site root"),
                )
                .arg(
                    Arg::new("create-missing")
                        .long("create-missing")
                        .action(ArgAction::SetTrue)
                        .help("Create students that do not exist yet"),
                )
                .arg(
                    Arg::new("not-watermarked")
                        .long("not-watermarked")
                        .action(ArgAction::SetTrue),
                )
                .arg(text("major", "Major for created students"))
                .arg(Arg::new("year").long("year").value_parser(value_parser!(i32)))
                .arg(text("note", "Note for every admission")),
        )
}

/// Full command tree
pub(crate) fn command() -> Command {
    Command::new("roster")
        .version(roster_core::VERSION)
        .about("Person and student record store")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .default_value(CONFIG_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .subcommand(Command::new("config").about("Show where artifacts live"))
        .subcommand(people_command())
        .subcommand(students_command())
        .subcommand(
            Command::new("snapshots")
                .about("List backups of an artifact")
                .arg(
                    Arg::new("label")
                        .default_value("teachers.json")
                        .help("Artifact file name"),
                ),
        )
}

/// `vocal_001:2` to the person's id and 1-based role number
fn parse_ranked_role(raw: &str) -> Result<(Identity, usize), String> {
    let (id, index) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <id>:<role number>, got '{raw}'"))?;
    let index = index
        .parse::<usize>()
        .map_err(|e| format!("bad role number in '{raw}': {e}"))?;
    if id.trim().is_empty() {
        return Err(format!("missing id in '{raw}'"));
    }
    Ok((Identity::id(id.trim()), index))
}

fn string(args: &ArgMatches, name: &str) -> Option<String> {
    args.get_one::<String>(name).cloned()
}

fn required(args: &ArgMatches, name: &str) -> Result<String> {
    string(args, name).with_context(|| format!("--{name} is required"))
}

fn identity(args: &ArgMatches) -> Result<Identity> {
    match (string(args, "id"), string(args, "name")) {
        (Some(id), _) => Ok(Identity::Id(id)),
        (None, Some(name)) => Ok(Identity::Name(name)),
        (None, None) => bail!("one of --id or --name is required"),
    }
}

fn index(args: &ArgMatches) -> Result<usize> {
    args.get_one::<usize>("index")
        .copied()
        .context("--index is required")
}

fn people(args: &ArgMatches) -> Result<Operation> {
    let operation = match args.subcommand() {
        Some(("list", a)) => Operation::List {
            department: string(a, "department"),
        },
        Some(("validate", _)) => Operation::Validate,
        Some(("add", a)) => {
            let mut new = NewPerson::named(required(a, "name")?);
            new.id = string(a, "id");
            new.prefix = string(a, "prefix");
            new.photo = string(a, "photo");
            new.short_summary = string(a, "summary");
            new.bio = string(a, "bio");
            new.achievements = a
                .get_many::<String>("achievement")
                .map(|v| v.cloned().collect())
                .unwrap_or_default();
            if let (Some(department), Some(position)) =
                (string(a, "department"), string(a, "position"))
            {
                let order = a.get_one::<i64>("order").copied().unwrap_or(1);
                new.roles.push(Role::new(department, position, order));
            }
            Operation::AddPerson(new)
        }
        Some(("add-role", a)) => Operation::AddRole {
            identity: identity(a)?,
            department: required(a, "department")?,
            position: required(a, "position")?,
            order: a.get_one::<i64>("order").copied(),
        },
        Some(("edit", a)) => Operation::EditPerson {
            identity: identity(a)?,
            edit: PersonEdit {
                name: string(a, "set-name"),
                photo: string(a, "photo"),
                short_summary: string(a, "summary"),
                bio: string(a, "bio"),
                append_achievements: a
                    .get_many::<String>("append-achievement")
                    .map(|v| v.cloned().collect())
                    .unwrap_or_default(),
                clear_achievements: a.get_flag("clear-achievements"),
            },
        },
        Some(("edit-role", a)) => Operation::EditRole {
            identity: identity(a)?,
            index: index(a)?,
            edit: RoleEdit {
                department: string(a, "department"),
                position: string(a, "position"),
                order: a.get_one::<i64>("order").copied(),
            },
        },
        Some(("remove-role", a)) => Operation::RemoveRole {
            identity: identity(a)?,
            index: index(a)?,
        },
        Some(("remove", a)) => Operation::Remove {
            identity: identity(a)?,
        },
        Some(("import", a)) => {
            let path = a
                .get_one::<PathBuf>("file")
                .context("--file is required")?;
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Operation::SyncFromSource {
                source: ImportSource::Table(table_from_json(&bytes)?),
                mode: if a.get_flag("replace") {
                    ImportMode::Replace
                } else {
                    ImportMode::Merge
                },
                dry_run: a.get_flag("dry-run"),
            }
        }
        Some(("reorder", a)) => match (a.get_one::<usize>("to"), string(a, "department")) {
            (Some(&to), _) => Operation::Reorder(Reorder::Move {
                identity: identity(a)?,
                to,
            }),
            (None, Some(department)) => Operation::Reorder(Reorder::Department {
                department,
                roles: a
                    .get_many::<(Identity, usize)>("role")
                    .map(|v| v.cloned().collect())
                    .unwrap_or_default(),
            }),
            (None, None) => Operation::Reorder(Reorder::ByRoleOrder),
        },
        Some((other, _)) => bail!("unknown people command '{other}'"),
        None => bail!("missing people command"),
    };
    Ok(operation)
}

fn students(args: &ArgMatches) -> Result<StudentOperation> {
    let operation = match args.subcommand() {
        Some(("list", a)) => StudentOperation::List {
            school: string(a, "school"),
        },
        Some(("validate", _)) => StudentOperation::Validate,
        Some(("add", a)) => StudentOperation::AddStudent(NewStudent {
            id: string(a, "id"),
            name: required(a, "name")?,
            school: required(a, "school")?,
            major: required(a, "major")?,
            year: a.get_one::<i32>("year").copied(),
            photo: string(a, "photo"),
        }),
        Some(("add-admission", a)) => {
            let mut admission = Admission::new(required(a, "image")?, a.get_flag("watermarked"));
            if let Some(note) = string(a, "note") {
                admission = admission.with_note(note);
            }
            StudentOperation::AddAdmission {
                identity: identity(a)?,
                admission,
            }
        }
        Some(("edit", a)) => StudentOperation::EditStudent {
            identity: identity(a)?,
            edit: StudentEdit {
                name: string(a, "set-name"),
                school: string(a, "school"),
                major: string(a, "major"),
                year: a.get_one::<i32>("year").copied(),
                photo: string(a, "photo"),
            },
        },
        Some(("remove-admission", a)) => StudentOperation::RemoveAdmission {
            identity: identity(a)?,
            index: index(a)?,
        },
        Some(("remove", a)) => StudentOperation::Remove {
            identity: identity(a)?,
        },
        Some(("record-admissions", a)) => {
            let watermarked = !a.get_flag("not-watermarked");
            StudentOperation::RecordAdmissions(AdmissionBatch {
                entries: a
                    .get_many::<String>("image")
                    .into_iter()
                    .flatten()
                    .map(|image| AdmissionEntry {
                        image: image.clone(),
                        watermarked,
                    })
                    .collect(),
                create_missing: a.get_flag("create-missing"),
                major: string(a, "major"),
                year: a.get_one::<i32>("year").copied(),
                note: string(a, "note"),
            })
        }
        Some((other, _)) => bail!("unknown students command '{other}'"),
        None => bail!("missing students command"),
    };
    Ok(operation)
}

/// Translate parsed arguments
pub(crate) fn parse(matches: &ArgMatches) -> Result<Invocation> {
    let request = match matches.subcommand() {
        Some(("config", _)) => Request::Config,
        Some(("people", a)) => Request::People(people(a)?),
        Some(("students", a)) => Request::Students(students(a)?),
        Some(("snapshots", a)) => Request::Snapshots {
            label: required(a, "label")?,
        },
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("missing command"),
    };
    Ok(Invocation {
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE)),
        json: matches.get_flag("json"),
        request,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn invoke(args: &[&str]) -> Invocation {
        let matches = command().try_get_matches_from(args).unwrap();
        parse(&matches).unwrap()
    }

    #[test]
    fn command_tree_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn remove_role_by_name() {
        let invocation = invoke(&["roster", "people", "remove-role", "--name", "陈涛", "--index", "2"]);
        let Request::People(operation) = invocation.request else {
            panic!("expected a people request");
        };
        assert_eq!(
            operation,
            Operation::RemoveRole {
                identity: Identity::name("陈涛"),
                index: 2
            }
        );
        assert_eq!(invocation.config, PathBuf::from(CONFIG_FILE));
    }

    #[test]
    fn identity_is_required() {
        assert!(command()
            .try_get_matches_from(["roster", "people", "remove", "--index", "1"])
            .is_err());
        assert!(command()
            .try_get_matches_from(["roster", "people", "remove"])
            .is_err());
    }

    #[test]
    fn add_with_initial_role() {
        let invocation = invoke(&[
            "roster", "--json", "people", "add", "--name", "韩刚", "--prefix", "vocal",
            "--department", "声乐组", "--position", "声乐教师", "--achievement", "金奖",
        ]);
        assert!(invocation.json);
        let Request::People(Operation::AddPerson(new)) = invocation.request else {
            panic!("expected add");
        };
        assert_eq!(new.prefix.as_deref(), Some("vocal"));
        assert_eq!(new.roles, vec![Role::new("声乐组", "声乐教师", 1)]);
        assert_eq!(new.achievements, vec!["金奖"]);
    }

    #[test]
    fn reorder_variants() {
        let invocation = invoke(&["roster", "people", "reorder"]);
        assert!(matches!(
            invocation.request,
            Request::People(Operation::Reorder(Reorder::ByRoleOrder))
        ));
        let invocation = invoke(&["roster", "people", "reorder", "--id", "vocal_001", "--to", "1"]);
        assert!(matches!(
            invocation.request,
            Request::People(Operation::Reorder(Reorder::Move { to: 1, .. }))
        ));
    }

    #[test]
    fn reorder_department_roles() {
        let invocation = invoke(&[
            "roster", "people", "reorder", "--department", "声乐组",
            "--role", "vocal_001:1", "--role", "admin_001:2",
        ]);
        let Request::People(operation) = invocation.request else {
            panic!("expected a people request");
        };
        assert_eq!(
            operation,
            Operation::Reorder(Reorder::Department {
                department: "声乐组".to_string(),
                roles: vec![(Identity::id("vocal_001"), 1), (Identity::id("admin_001"), 2)],
            })
        );
        assert!(command()
            .try_get_matches_from(["roster", "people", "reorder", "--department", "d", "--role", "x"])
            .is_err());
    }

    #[test]
    fn record_admissions_collects_images() {
        let invocation = invoke(&[
            "roster", "students", "record-admissions", "a/张三__央音__1.jpg", "a/李四__上音__1.jpg",
            "--create-missing", "--year", "2025",
        ]);
        let Request::Students(StudentOperation::RecordAdmissions(batch)) = invocation.request
        else {
            panic!("expected record-admissions");
        };
        assert_eq!(batch.entries.len(), 2);
        assert!(batch.entries.iter().all(|e| e.watermarked));
        assert!(batch.create_missing);
        assert_eq!(batch.year, Some(2025));
    }
}
