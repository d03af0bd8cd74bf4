//! Shared Tidewater types: the static table registry, the staged object key
//! schema, trigger event payloads, and the error classification model.
//!
//! This crate carries no I/O and is depended on by every other crate in the
//! workspace.

#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod key;
pub mod table;

pub use error::{Classify, ErrorCategory};
pub use key::{KeyError, StagedKey};
pub use table::{Join, Relation, SourceTable, TableKind};
