//! Relational source capability.

use arrow::record_batch::RecordBatch;
use tidewater_sql::{DbError, Dialect};

use crate::query::ExtractQuery;

/// A database the extractor can read time-windowed rows from.
///
/// Implementations hold one connection for the whole run; the extractor
/// calls [`fetch`](Self::fetch) once per allow-listed table.
pub trait RelationalSource {
    /// Placeholder syntax the source's driver expects.
    fn dialect(&self) -> Dialect;

    /// User tables visible to the connection, excluding system catalogs and
    /// names beginning with `_`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`DbError`] if the catalog cannot be read.
    fn table_names(&mut self) -> Result<Vec<String>, DbError>;

    /// Execute `query` and return every matching row as one batch.
    ///
    /// # Errors
    ///
    /// Returns a classified [`DbError`]. A missing or unreadable table is
    /// reported as [`ErrorCategory::TableUnavailable`](tidewater_types::ErrorCategory::TableUnavailable).
    fn fetch(&mut self, query: &ExtractQuery) -> Result<RecordBatch, DbError>;
}
