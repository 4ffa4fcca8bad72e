//! Roster record model
//!
//! Typed person and student records, the ordered collections they are
//! persisted in, and the identity rules that keep them addressable.
//!
//! # Core Concepts
//!
//! - [`RecordKind`]: what the store needs to know about a record type
//! - [`Collection<K>`]: ordered, immutable-by-convention record sequence
//! - [`Fingerprint`]: opaque content state used for conditional writes
//! - [`IdentityAllocator`]: `<prefix>_<sequence>` identifier allocation
//! - [`MediaPath`]: syntax check for relative media references
//!
//! # Example
//!
//! ```rust,ignore
//! use roster_record::{allocate, Collection, Person, PersonRecord};
//!
//! let mut people = Collection::<Person>::default();
//! let id = allocate("vocal", people.ids())?;
//! people.push(PersonRecord::new(id, "陈涛"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod fingerprint;
mod identity;
mod kind;
mod media;
mod person;
mod student;
pub mod text;

pub use fingerprint::{ContentHash, Fingerprint};
pub use identity::{allocate, AllocationError, Identity, IdentityAllocator};
pub use kind::{Collection, DecodeError, IncompletePart, MediaRef, RecordKind};
pub use media::{MediaPath, MediaPathError};
pub use person::{Person, PersonRecord, Role};
pub use student::{Admission, NameHint, Student, StudentRecord};
pub use text::DepartmentAliases;

/// Sealed trait support for record kinds.
/// **Note:** This is only for internal/testing use and may change.
#[doc(hidden)]
pub mod __private {
    pub use super::kind::private::Sealed;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
