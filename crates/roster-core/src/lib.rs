//! Roster operations
//!
//! The operation surface over person and student collections: a closed set
//! of operations, one exhaustive handler per record kind, and the mutation
//! pipeline every change goes through.
//!
//! # Pipeline
//!
//! 1. **Load**: read the artifact and its fingerprint
//! 2. **Transform**: pure function to the proposed collection
//! 3. **Validate**: any fatal finding rejects the mutation untouched
//! 4. **Snapshot**: copy the prior artifact; failure aborts
//! 5. **Write**: conditional on the fingerprint read in step 1
//! 6. **Journal**: one line per committed change
//!
//! # Example
//!
//! ```rust,ignore
//! use roster_core::{NewPerson, Operation, RosterConfig};
//!
//! let config = RosterConfig::load("roster.toml".as_ref())?;
//! let people = config.people()?;
//! let response = people
//!     .execute(Operation::AddPerson(NewPerson::named("韩刚").with_prefix("vocal")))
//!     .await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod import;
mod journal;
mod operation;
mod people;
mod registry;
mod students;

pub use config::{RemoteConfig, RosterConfig, StorageMode, CONFIG_FILE, TOKEN_ENV};
pub use error::{ConfigError, RosterError};
pub use import::table_from_json;
pub use journal::{ChangeJournal, DEFAULT_AUTHOR};
pub use operation::{
    AdmissionBatch, AdmissionEntry, AdmissionSummary, ImportMode, ImportSource, ImportSummary,
    NewPerson, NewStudent, Operation, PersonEdit, Reorder, Response, RoleEdit, StudentEdit,
    StudentOperation,
};
pub use registry::{Defaults, Outcome, Proposal, Registry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
