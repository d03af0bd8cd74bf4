//! Relational target capability.

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tidewater_sql::{DbError, Dialect};

use crate::statement::UpsertStatement;

/// Commit granularity for one staged object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Every row commits on its own; earlier rows survive a later failure.
    PerRow,
    /// One transaction per object, rolled back on any error.
    #[default]
    PerBatch,
}

/// A database the loader can upsert rows into.
pub trait RelationalTarget {
    /// Placeholder syntax the target's driver expects.
    fn dialect(&self) -> Dialect;

    /// Execute `statement` once per row of `batches` and return rows applied.
    ///
    /// Column `i` of every batch binds to placeholder `i + 1`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`DbError`]. Under [`CommitMode::PerBatch`] no
    /// row of the object is visible after an error.
    fn apply(
        &mut self,
        statement: &UpsertStatement,
        batches: &[RecordBatch],
        mode: CommitMode,
    ) -> Result<u64, DbError>;
}
