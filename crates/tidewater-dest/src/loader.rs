//! Staged object to warehouse upsert.
//!
//! One invocation loads one object: the key names the source table, the
//! table names the relation, and the object's own columns shape the upsert.

use std::time::Instant;

use tidewater_sql::DbError;
use tidewater_storage::{decode_batches, CodecError, ObjectStore, StorageError};
use tidewater_types::event::{EventError, ObjectNotification};
use tidewater_types::{Classify, ErrorCategory, KeyError, SourceTable, StagedKey};

use crate::statement::{normalize_sentinel_columns, policy_for, ColumnSpec, UpsertStatement};
use crate::target::{CommitMode, RelationalTarget};

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub target_table: String,
    pub rows: u64,
}

/// What the event dispatcher did with one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Loaded(LoadReport),
    /// Terminal failure; logged and not worth redelivering.
    Rejected {
        category: ErrorCategory,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("no warehouse relation for table '{table}'")]
    UnknownTable { table: String },

    #[error("fetching staged object failed: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("loading '{target}' failed: {source}")]
    Db {
        target: String,
        #[source]
        source: DbError,
    },

    #[error(transparent)]
    Event(#[from] EventError),
}

impl Classify for LoadError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Key(e) => e.category(),
            Self::UnknownTable { .. } => ErrorCategory::Lookup,
            Self::Storage(e) => e.category(),
            Self::Codec(e) => e.category(),
            Self::Db { source, .. } => source.category(),
            Self::Event(e) => e.category(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Loads staged objects into one relational target.
pub struct Loader<'a> {
    objects: &'a dyn ObjectStore,
    target: &'a mut dyn RelationalTarget,
    mode: CommitMode,
}

impl<'a> Loader<'a> {
    pub fn new(
        objects: &'a dyn ObjectStore,
        target: &'a mut dyn RelationalTarget,
        mode: CommitMode,
    ) -> Self {
        Self {
            objects,
            target,
            mode,
        }
    }

    /// Upsert every row of `bucket/key` into its warehouse relation.
    ///
    /// # Errors
    ///
    /// Returns a classified [`LoadError`]. Under [`CommitMode::PerBatch`]
    /// nothing from the object is visible after an error.
    pub fn handle(&mut self, bucket: &str, key: &str) -> Result<LoadReport> {
        let started = Instant::now();
        let staged = StagedKey::parse(key)?;
        let relation = staged
            .table()
            .parse::<SourceTable>()
            .ok()
            .and_then(SourceTable::relation)
            .ok_or_else(|| LoadError::UnknownTable {
                table: staged.table().to_string(),
            })?;
        let target_table = relation.target_table;

        let body = self.objects.get(bucket, key)?;
        let batches = decode_batches(body)?;
        let Some(first) = batches.first() else {
            tracing::info!(bucket, key, target_table, "Staged object has no row groups");
            return Ok(LoadReport {
                target_table: target_table.to_string(),
                rows: 0,
            });
        };

        let specs: Vec<ColumnSpec> = first
            .schema()
            .fields()
            .iter()
            .map(|f| ColumnSpec::new(f.name().as_str(), policy_for(target_table, f.name())))
            .collect();
        let db_err = |source: DbError| LoadError::Db {
            target: target_table.to_string(),
            source,
        };

        let batches = batches
            .iter()
            .map(|b| normalize_sentinel_columns(b, &specs))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        let statement = UpsertStatement::build(
            target_table,
            relation.primary_key,
            specs,
            self.target.dialect(),
        )
        .map_err(db_err)?;
        tracing::debug!(target_table, sql = statement.sql(), "Built upsert");

        let rows = self
            .target
            .apply(&statement, &batches, self.mode)
            .map_err(db_err)?;
        tracing::info!(
            bucket,
            key,
            target_table,
            rows,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Loaded staged object"
        );
        Ok(LoadReport {
            target_table: target_table.to_string(),
            rows,
        })
    }

    /// Decode an object-created notification and load the object it names.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Event`] for a malformed notification, otherwise as
    /// [`handle`](Self::handle).
    pub fn handle_event(&mut self, body: &str) -> Result<LoadReport> {
        let object = ObjectNotification::from_json(body)?.object()?;
        self.handle(&object.bucket, &object.key)
    }

    /// [`handle`](Self::handle), with terminal failures logged and turned
    /// into [`Dispatch::Rejected`].
    ///
    /// # Errors
    ///
    /// Only retryable errors are returned, so the trigger redelivers.
    pub fn dispatch(&mut self, bucket: &str, key: &str) -> Result<Dispatch> {
        let result = self.handle(bucket, key);
        settle(bucket, key, result)
    }

    /// [`handle_event`](Self::handle_event) through the same policy as
    /// [`dispatch`](Self::dispatch).
    ///
    /// # Errors
    ///
    /// Only retryable errors are returned.
    pub fn dispatch_event(&mut self, body: &str) -> Result<Dispatch> {
        match ObjectNotification::from_json(body).and_then(|n| n.object()) {
            Ok(object) => self.dispatch(&object.bucket, &object.key),
            Err(e) => settle("-", "-", Err(e.into())),
        }
    }
}

fn settle(bucket: &str, key: &str, result: Result<LoadReport>) -> Result<Dispatch> {
    match result {
        Ok(report) => Ok(Dispatch::Loaded(report)),
        Err(e) if e.is_retryable() => {
            tracing::error!(bucket, key, error = %e, category = %e.category(), "Load failed; will be retried");
            Err(e)
        }
        Err(e) => {
            tracing::warn!(bucket, key, error = %e, category = %e.category(), "Load rejected");
            Ok(Dispatch::Rejected {
                category: e.category(),
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_table_is_terminal_lookup() {
        let err = LoadError::UnknownTable {
            table: "department".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Lookup);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "no warehouse relation for table 'department'");
    }

    #[test]
    fn db_errors_keep_their_category() {
        let err = LoadError::Db {
            target: "dim_staff".into(),
            source: DbError::new(ErrorCategory::TransientDb, "connection reset"),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("loading 'dim_staff' failed"));
    }

    #[test]
    fn settle_splits_on_retryability() {
        let missing = LoadError::Storage(StorageError::no_such_key("extraction", "k"));
        assert!(matches!(
            settle("extraction", "k", Err(missing)),
            Err(LoadError::Storage(_))
        ));

        let rejected = settle(
            "extraction",
            "k",
            Err(LoadError::UnknownTable {
                table: "nope".into(),
            }),
        )
        .unwrap();
        assert!(matches!(
            rejected,
            Dispatch::Rejected {
                category: ErrorCategory::Lookup,
                ..
            }
        ));
    }
}
