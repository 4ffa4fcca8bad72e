//! Roster merge and validation
//!
//! Turns raw import rows into merged person records and checks proposed
//! collection states before they are committed.
//!
//! # Pipeline position
//!
//! ```text
//! Table ──into_rows──▶ RawRow* ──RoleMerger──▶ PersonRecord* ──Validator──▶ Report
//! ```
//!
//! Nothing in this crate performs I/O apart from the optional media
//! existence check.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod finding;
mod merger;
mod row;
mod validator;

pub use finding::{Finding, FindingKind, Report, Severity, Subject};
pub use merger::{absorb, GroupKey, MergeOutcome, MergedRecord, RoleMerger};
pub use row::{
    split_achievements, ImportError, RawRow, RowBatch, RowRole, Table, COLUMNS, REQUIRED_COLUMNS,
};
pub use validator::Validator;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
