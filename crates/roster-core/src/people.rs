//! Person operations
//!
//! Each mutating operation is a pure transform from the loaded collection to
//! a [`Proposal`]; [`Registry::execute`] runs it through the pipeline.

use crate::error::RosterError;
use crate::import::sync_from_source;
use crate::operation::{ImportSummary, NewPerson, Operation, PersonEdit, Reorder, Response, RoleEdit};
use crate::registry::{locate, optional_text, Defaults, Proposal, Registry};
use roster_record::text::{non_blank, norm_line};
use roster_record::{allocate, Collection, Identity, Person, PersonRecord, Role};
use roster_store::StorageBackend;

type People = Collection<Person>;

impl<B: StorageBackend> Registry<Person, B> {
    /// Execute one person operation
    ///
    /// # Errors
    /// See [`RosterError`]; read-only operations only fail on store errors
    pub async fn execute(&self, operation: Operation) -> Result<Response<Person>, RosterError> {
        let defaults = self.defaults().clone();
        tracing::debug!(?operation, "executing");

        let outcome = match operation {
            Operation::List { department } => {
                let (people, _) = self.read().await?;
                return Ok(Response::Listing(list(people, department.as_deref(), &defaults)));
            }
            Operation::Validate => return Ok(Response::Validated(self.check().await?)),
            Operation::SyncFromSource {
                source,
                mode,
                dry_run,
            } => {
                let mut summary = ImportSummary::default();
                let outcome = self
                    .commit(dry_run, |people| {
                        let (proposal, counts) = sync_from_source(people, &defaults, source, mode)?;
                        summary = counts;
                        Ok(proposal)
                    })
                    .await?;
                return Ok(Response::Imported { outcome, summary });
            }
            Operation::AddPerson(new) => {
                self.commit(false, |people| add_person(people, &defaults, new))
                    .await?
            }
            Operation::AddRole {
                identity,
                department,
                position,
                order,
            } => {
                self.commit(false, |people| {
                    add_role(people, &defaults, &identity, &department, &position, order)
                })
                .await?
            }
            Operation::EditPerson { identity, edit } => {
                self.commit(false, |people| edit_person(people, &identity, edit))
                    .await?
            }
            Operation::EditRole {
                identity,
                index,
                edit,
            } => {
                self.commit(false, |people| {
                    edit_role(people, &defaults, &identity, index, edit)
                })
                .await?
            }
            Operation::RemoveRole { identity, index } => {
                self.commit(false, |people| remove_role(people, &identity, index))
                    .await?
            }
            Operation::Remove { identity } => {
                self.commit(false, |people| remove(people, &identity)).await?
            }
            Operation::Reorder(reorder) => {
                self.commit(false, |people| reorder_people(people, &defaults, reorder))
                    .await?
            }
        };
        Ok(Response::Changed(outcome))
    }
}

fn list(people: People, department: Option<&str>, defaults: &Defaults) -> People {
    match department {
        None => people,
        Some(department) => {
            let department = defaults.aliases.canonical(department);
            Collection::new(
                people
                    .into_records()
                    .into_iter()
                    .filter(|p| p.holds_department(&department))
                    .collect(),
            )
        }
    }
}

fn canonical_role(defaults: &Defaults, role: Role) -> Role {
    Role::new(
        defaults.aliases.canonical(&role.department),
        norm_line(&role.position),
        role.order,
    )
}

pub(crate) fn add_person(
    mut people: People,
    defaults: &Defaults,
    new: NewPerson,
) -> Result<Proposal<Person>, RosterError> {
    let id = match new.id.as_deref().and_then(non_blank) {
        Some(id) => id,
        None => {
            let prefix = new.prefix.as_deref().unwrap_or(&defaults.person_prefix);
            allocate(prefix, people.ids())?
        }
    };

    let mut record = PersonRecord::new(id, norm_line(&new.name));
    record.photo = new.photo.as_deref().and_then(optional_text);
    record.short_summary = new.short_summary.as_deref().and_then(optional_text);
    record.bio = new.bio.as_deref().and_then(optional_text);
    for achievement in new.achievements.iter().filter_map(|a| non_blank(a)) {
        record.ensure_achievement(achievement);
    }
    for role in new.roles {
        record.ensure_role(canonical_role(defaults, role));
    }

    let summary = format!("add person {} ({})", record.name, record.id);
    people.push(record);
    Ok(Proposal::new(people, summary))
}

pub(crate) fn add_role(
    mut people: People,
    defaults: &Defaults,
    identity: &Identity,
    department: &str,
    position: &str,
    order: Option<i64>,
) -> Result<Proposal<Person>, RosterError> {
    let index = locate(&people, identity)?;
    let record = &mut people.records_mut()[index];
    let order = order.unwrap_or_else(|| record.next_order());
    let role = canonical_role(defaults, Role::new(department, position, order));
    let summary = format!(
        "add role {}/{} to {} ({})",
        role.department, role.position, record.name, record.id
    );
    record.ensure_role(role);
    Ok(Proposal::new(people, summary))
}

pub(crate) fn edit_person(
    mut people: People,
    identity: &Identity,
    edit: PersonEdit,
) -> Result<Proposal<Person>, RosterError> {
    let index = locate(&people, identity)?;
    let record = &mut people.records_mut()[index];

    let mut fields = Vec::new();
    if let Some(name) = edit.name {
        record.name = norm_line(&name);
        fields.push("name");
    }
    for (field, slot, value) in [
        ("photo", &mut record.photo, edit.photo),
        ("shortSummary", &mut record.short_summary, edit.short_summary),
        ("bio", &mut record.bio, edit.bio),
    ] {
        if let Some(value) = value {
            *slot = optional_text(&value);
            fields.push(field);
        }
    }
    if edit.clear_achievements {
        record.achievements.clear();
        fields.push("achievements");
    }
    if !edit.append_achievements.is_empty() {
        for achievement in edit.append_achievements.iter().filter_map(|a| non_blank(a)) {
            record.ensure_achievement(achievement);
        }
        if !edit.clear_achievements {
            fields.push("achievements");
        }
    }

    let summary = format!("edit {} ({}): {}", record.name, record.id, fields.join(", "));
    Ok(Proposal::new(people, summary))
}

/// 0-based slot of a 1-based role index
fn role_slot(record: &PersonRecord, identity: &Identity, index: usize) -> Result<usize, RosterError> {
    if index == 0 || index > record.roles.len() {
        return Err(RosterError::RoleIndexOutOfRange {
            identity: identity.clone(),
            index,
            len: record.roles.len(),
        });
    }
    Ok(index - 1)
}

pub(crate) fn edit_role(
    mut people: People,
    defaults: &Defaults,
    identity: &Identity,
    index: usize,
    edit: RoleEdit,
) -> Result<Proposal<Person>, RosterError> {
    let position = locate(&people, identity)?;
    let record = &mut people.records_mut()[position];
    let slot = role_slot(record, identity, index)?;

    let role = &mut record.roles[slot];
    if let Some(department) = edit.department {
        role.department = defaults.aliases.canonical(&department);
    }
    if let Some(title) = edit.position {
        role.position = norm_line(&title);
    }
    if let Some(order) = edit.order {
        role.order = order;
    }
    let summary = format!(
        "edit role #{index} of {} ({}): {}/{} order={}",
        record.name, record.id, role.department, role.position, role.order
    );
    Ok(Proposal::new(people, summary))
}

pub(crate) fn remove_role(
    mut people: People,
    identity: &Identity,
    index: usize,
) -> Result<Proposal<Person>, RosterError> {
    let position = locate(&people, identity)?;
    let record = &mut people.records_mut()[position];
    let slot = role_slot(record, identity, index)?;
    let removed = record.roles.remove(slot);
    let summary = format!(
        "remove role #{index} {}/{} from {} ({})",
        removed.department, removed.position, record.name, record.id
    );
    Ok(Proposal::new(people, summary))
}

pub(crate) fn remove(mut people: People, identity: &Identity) -> Result<Proposal<Person>, RosterError> {
    let position = locate(&people, identity)?;
    let removed = people.records_mut().remove(position);
    let summary = format!("remove person {} ({})", removed.name, removed.id);
    Ok(Proposal::new(people, summary))
}

pub(crate) fn reorder_people(
    mut people: People,
    defaults: &Defaults,
    reorder: Reorder,
) -> Result<Proposal<Person>, RosterError> {
    let summary = match reorder {
        Reorder::ByRoleOrder => {
            people
                .records_mut()
                .sort_by(|a, b| a.min_order().cmp(&b.min_order()).then_with(|| a.name.cmp(&b.name)));
            "reorder people by role order".to_string()
        }
        Reorder::Move { identity, to } => {
            let from = locate(&people, &identity)?;
            let records = people.records_mut();
            let record = records.remove(from);
            let target = to.clamp(1, records.len() + 1) - 1;
            let summary = format!("move {} ({}) to position {}", record.name, record.id, target + 1);
            records.insert(target, record);
            summary
        }
        Reorder::Department { department, roles } => {
            let department = defaults.aliases.canonical(&department);
            let ranked = rank_department(&mut people, &department, &roles)?;
            format!("reorder {department}: {} role(s) ranked, {ranked} renumbered", roles.len())
        }
    };
    Ok(Proposal::new(people, summary))
}

/// Renumber every role of `department`, listed ones first
///
/// Returns how many roles were renumbered.
fn rank_department(
    people: &mut People,
    department: &str,
    ranked: &[(Identity, usize)],
) -> Result<usize, RosterError> {
    let view: &People = people;
    // (record, role slot) pairs
    let mut rest: Vec<(usize, usize)> = view
        .iter()
        .enumerate()
        .flat_map(|(r, person)| {
            person
                .roles
                .iter()
                .enumerate()
                .filter(move |(_, role)| role.department == department)
                .map(move |(s, _)| (r, s))
        })
        .collect();
    let order_of = |(r, s): (usize, usize)| view.records()[r].roles[s].order;
    let base = rest.iter().map(|&slot| order_of(slot)).min().unwrap_or(1);

    let mut wanted = Vec::with_capacity(ranked.len());
    for (identity, index) in ranked {
        let r = locate(view, identity)?;
        let s = role_slot(&view.records()[r], identity, *index)?;
        if view.records()[r].roles[s].department != department {
            return Err(RosterError::RoleNotInDepartment {
                identity: identity.clone(),
                index: *index,
                department: department.to_string(),
            });
        }
        if !wanted.contains(&(r, s)) {
            wanted.push((r, s));
        }
    }
    rest.retain(|slot| !wanted.contains(slot));
    rest.sort_by_key(|&slot| order_of(slot));

    let records = people.records_mut();
    let mut order = base;
    let mut renumbered = 0;
    for (r, s) in wanted.into_iter().chain(rest) {
        records[r].roles[s].order = order;
        order += 1;
        renumbered += 1;
    }
    Ok(renumbered)
}
