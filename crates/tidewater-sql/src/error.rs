//! Classified database errors.

use tidewater_types::error::category_for_sqlstate;
use tidewater_types::{Classify, ErrorCategory};

/// A database failure with its pipeline classification.
///
/// `message` carries the driver's text plus any server diagnostics; the
/// original SQLSTATE (when the backend reports one) is kept alongside.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DbError {
    pub category: ErrorCategory,
    pub sqlstate: Option<String>,
    pub message: String,
}

impl DbError {
    #[must_use]
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            sqlstate: None,
            message: message.into(),
        }
    }

    /// Schema mismatch (not retryable).
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Schema, message)
    }

    /// Invalid data (not retryable).
    #[must_use]
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, message)
    }

    /// Invalid connection configuration (not retryable).
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, message)
    }

    /// Classify a `postgres` driver error.
    ///
    /// Server errors are classified by SQLSTATE. Client-side failures are
    /// transient when the connection is closed or the cause is an I/O error.
    #[must_use]
    pub fn from_postgres(prefix: &str, error: &postgres::Error) -> Self {
        if let Some(db_error) = error.as_db_error() {
            let code = db_error.code().code();
            let detail = db_error.detail().unwrap_or("n/a");
            let hint = db_error.hint().unwrap_or("n/a");
            return Self {
                category: category_for_sqlstate(code),
                sqlstate: Some(code.to_string()),
                message: format!(
                    "{prefix}: {} (sqlstate={} severity={} detail={} hint={})",
                    db_error.message(),
                    code,
                    db_error.severity(),
                    detail,
                    hint
                ),
            };
        }

        let io_cause = std::error::Error::source(error)
            .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());
        let category = if error.is_closed() || io_cause {
            ErrorCategory::TransientNetwork
        } else {
            ErrorCategory::Internal
        };
        Self::new(category, format!("{prefix}: {error}"))
    }

    /// Classify a `rusqlite` error.
    #[must_use]
    pub fn from_sqlite(prefix: &str, error: &rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let category = match error {
            rusqlite::Error::SqliteFailure(failure, message) => {
                sqlite_message_category(message.as_deref().unwrap_or_default()).unwrap_or(
                    match failure.code {
                        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                            ErrorCategory::TransientDb
                        }
                        ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch => {
                            ErrorCategory::Data
                        }
                        ErrorCode::PermissionDenied | ErrorCode::ReadOnly => {
                            ErrorCategory::Permission
                        }
                        ErrorCode::CannotOpen | ErrorCode::NotADatabase => ErrorCategory::Config,
                        _ => ErrorCategory::Internal,
                    },
                )
            }
            // Prepare-time errors that carry an offset into the SQL text.
            rusqlite::Error::SqlInputError { msg, .. } => {
                sqlite_message_category(msg).unwrap_or(ErrorCategory::Schema)
            }
            rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::InvalidColumnIndex(_) => ErrorCategory::Schema,
            rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::ToSqlConversionFailure(_) => ErrorCategory::Data,
            _ => ErrorCategory::Internal,
        };
        Self::new(category, format!("{prefix}: {error}"))
    }

    /// Whether the failure means the queried table is absent or not readable.
    #[must_use]
    pub fn is_table_unavailable(&self) -> bool {
        self.category == ErrorCategory::TableUnavailable
    }
}

/// Categories `SQLite` only reports through the message text.
fn sqlite_message_category(message: &str) -> Option<ErrorCategory> {
    if message.starts_with("no such table") {
        Some(ErrorCategory::TableUnavailable)
    } else if message.starts_with("no such column")
        || message.contains("has no column named")
        || message.contains("syntax error")
    {
        Some(ErrorCategory::Schema)
    } else {
        None
    }
}

impl Classify for DbError {
    fn category(&self) -> ErrorCategory {
        self.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), Some(message.into()))
    }

    #[test]
    fn sqlite_missing_table_is_table_unavailable() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.prepare("SELECT * FROM nowhere").unwrap_err();
        let db = DbError::from_sqlite("query failed", &err);
        assert!(db.is_table_unavailable(), "got {db:?}");
        assert!(db.message.starts_with("query failed: "));
        assert!(!db.is_retryable());
    }

    #[test]
    fn sqlite_busy_is_transient() {
        let db = DbError::from_sqlite("exec", &sqlite_failure(5, "database is locked"));
        assert_eq!(db.category, ErrorCategory::TransientDb);
        assert!(db.is_retryable());
    }

    #[test]
    fn sqlite_constraint_is_data() {
        let db = DbError::from_sqlite("exec", &sqlite_failure(19, "NOT NULL constraint failed"));
        assert_eq!(db.category, ErrorCategory::Data);
    }

    #[test]
    fn sqlite_unknown_column_is_schema() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER)").unwrap();
        let err = conn.prepare("INSERT INTO t (b) VALUES (1)").unwrap_err();
        let db = DbError::from_sqlite("prepare", &err);
        assert_eq!(db.category, ErrorCategory::Schema, "got {db:?}");
    }

    #[test]
    fn sqlite_unknown_cursor_column_is_schema() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE payment (payment_id INTEGER, amount REAL)").unwrap();
        let err = conn
            .prepare("SELECT * FROM payment AS t WHERE t.last_updated < ?1")
            .unwrap_err();
        let db = DbError::from_sqlite("prepare", &err);
        assert_eq!(db.category, ErrorCategory::Schema, "got {db:?}");
        assert!(db.message.contains("no such column"), "{}", db.message);
    }

    #[test]
    fn sqlite_syntax_error_is_schema() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.prepare("SELECT * FROM transaction AS t").unwrap_err();
        let db = DbError::from_sqlite("prepare", &err);
        assert_eq!(db.category, ErrorCategory::Schema, "got {db:?}");
        assert!(!db.is_retryable());
    }

    #[test]
    fn parameter_count_mismatch_is_schema() {
        let db = DbError::from_sqlite("bind", &rusqlite::Error::InvalidParameterCount(1, 2));
        assert_eq!(db.category, ErrorCategory::Schema);
    }

    #[test]
    fn constructors_set_category() {
        assert_eq!(DbError::schema("x").category, ErrorCategory::Schema);
        assert_eq!(DbError::data("x").category, ErrorCategory::Data);
        assert_eq!(DbError::config("x").category, ErrorCategory::Config);
        assert_eq!(DbError::config("bad port").to_string(), "bad port");
    }
}
