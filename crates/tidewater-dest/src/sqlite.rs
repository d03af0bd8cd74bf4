//! `SQLite` target.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use rusqlite::types::Value;
use rusqlite::Connection;
use tidewater_sql::{DbError, Dialect};

use crate::statement::UpsertStatement;
use crate::target::{CommitMode, RelationalTarget};
use crate::typed_col::{cell_value, downcast_columns, CellValue};

/// [`RelationalTarget`] over a `rusqlite` connection.
pub struct SqliteTarget {
    conn: Connection,
}

impl SqliteTarget {
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// # Errors
    ///
    /// Returns a classified [`DbError`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Connection::open(path)
            .map(Self::from_connection)
            .map_err(|e| DbError::from_sqlite("Connection failed", &e))
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RelationalTarget for SqliteTarget {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn apply(
        &mut self,
        statement: &UpsertStatement,
        batches: &[RecordBatch],
        mode: CommitMode,
    ) -> Result<u64, DbError> {
        match mode {
            CommitMode::PerBatch => {
                let tx = self
                    .conn
                    .transaction()
                    .map_err(|e| DbError::from_sqlite("BEGIN failed", &e))?;
                // Dropping `tx` on error rolls back.
                let rows = execute_rows(&tx, statement, batches)?;
                tx.commit()
                    .map_err(|e| DbError::from_sqlite("COMMIT failed", &e))?;
                Ok(rows)
            }
            CommitMode::PerRow => execute_rows(&self.conn, statement, batches),
        }
    }
}

fn execute_rows(
    conn: &Connection,
    statement: &UpsertStatement,
    batches: &[RecordBatch],
) -> Result<u64, DbError> {
    let mut stmt = conn
        .prepare(statement.sql())
        .map_err(|e| DbError::from_sqlite(&format!("Prepare for {} failed", statement.target()), &e))?;

    let mut total: u64 = 0;
    for batch in batches {
        if batch.num_columns() != statement.columns().len() {
            return Err(DbError::schema(format!(
                "batch has {} columns, statement for {} binds {}",
                batch.num_columns(),
                statement.target(),
                statement.columns().len()
            )));
        }
        let cols = downcast_columns(batch)?;
        for row in 0..batch.num_rows() {
            let values: Vec<Value> = cols.iter().map(|c| to_value(cell_value(c, row))).collect();
            stmt.execute(rusqlite::params_from_iter(values)).map_err(|e| {
                DbError::from_sqlite(
                    &format!("Upsert into {} failed at row {}", statement.target(), total),
                    &e,
                )
            })?;
            total += 1;
        }
    }
    Ok(total)
}

fn to_value(cell: CellValue<'_>) -> Value {
    match cell {
        CellValue::Int16(Some(v)) => Value::Integer(i64::from(v)),
        CellValue::Int32(Some(v)) => Value::Integer(i64::from(v)),
        CellValue::Int64(Some(v)) => Value::Integer(v),
        CellValue::Float32(Some(v)) if !v.is_nan() => Value::Real(f64::from(v)),
        CellValue::Float64(Some(v)) if !v.is_nan() => Value::Real(v),
        CellValue::Boolean(Some(v)) => Value::Integer(i64::from(v)),
        CellValue::Text(Some(v)) => Value::Text(v.to_string()),
        CellValue::Bytes(Some(v)) => Value::Blob(v.to_vec()),
        CellValue::Timestamp(Some(_)) | CellValue::Date(Some(_)) | CellValue::Time(Some(_)) => {
            cell.to_text().map_or(Value::Null, Value::Text)
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn cells_map_to_sqlite_values() {
        assert_eq!(to_value(CellValue::Int32(Some(3))), Value::Integer(3));
        assert_eq!(to_value(CellValue::Boolean(Some(true))), Value::Integer(1));
        assert_eq!(to_value(CellValue::Float64(Some(f64::NAN))), Value::Null);
        assert_eq!(to_value(CellValue::Float64(Some(2.5))), Value::Real(2.5));
        assert_eq!(to_value(CellValue::Text(None)), Value::Null);
        assert_eq!(to_value(CellValue::Null), Value::Null);
        let d = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(to_value(CellValue::Date(Some(d))), Value::Text("2024-02-15".into()));
    }
}
