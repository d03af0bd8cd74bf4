//! `SQLite` source.
//!
//! `SQLite` is dynamically typed, so Arrow column types are inferred from the
//! values actually returned. Columns with no non-null value fall back to the
//! declared type's affinity.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryBuilder, Float64Array, Int64Array, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rusqlite::types::Value;
use rusqlite::Connection;
use tidewater_sql::{DbError, Dialect};

use crate::query::ExtractQuery;
use crate::source::RelationalSource;

/// Text form time bounds are bound as; matches how `SQLite` stores timestamps.
pub const SQLITE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// [`RelationalSource`] over a `rusqlite` connection.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
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

impl RelationalSource for SqliteSource {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn table_names(&mut self) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
            )
            .map_err(|e| DbError::from_sqlite("Table listing failed", &e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| DbError::from_sqlite("Table listing failed", &e))?;
        Ok(names)
    }

    fn fetch(&mut self, query: &ExtractQuery) -> Result<RecordBatch, DbError> {
        let mut stmt = self
            .conn
            .prepare(&query.sql)
            .map_err(|e| DbError::from_sqlite("Prepare failed", &e))?;

        let names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let declared: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(str::to_ascii_uppercase))
            .collect();

        let binds: Vec<String> = query
            .binds
            .iter()
            .map(|at| at.format(SQLITE_TIME_FORMAT).to_string())
            .collect();

        let width = names.len();
        let rows: Vec<Vec<Value>> = stmt
            .query_map(rusqlite::params_from_iter(binds.iter()), |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| DbError::from_sqlite("Query failed", &e))?;

        let mut fields = Vec::with_capacity(width);
        let mut arrays = Vec::with_capacity(width);
        for (idx, name) in names.iter().enumerate() {
            let data_type = infer_type(&rows, idx, declared[idx].as_deref());
            arrays.push(build_array(&rows, idx, &data_type));
            fields.push(Field::new(name, data_type, true));
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| DbError::data(format!("failed to create RecordBatch: {e}")))
    }
}

fn infer_type(rows: &[Vec<Value>], idx: usize, declared: Option<&str>) -> DataType {
    let mut inferred: Option<DataType> = None;
    for value in rows.iter().map(|r| &r[idx]) {
        let this = match value {
            Value::Null => continue,
            Value::Integer(_) => DataType::Int64,
            Value::Real(_) => DataType::Float64,
            Value::Text(_) => DataType::Utf8,
            Value::Blob(_) => DataType::Binary,
        };
        inferred = Some(match (inferred, this) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(DataType::Int64 | DataType::Float64), DataType::Int64 | DataType::Float64) => {
                DataType::Float64
            }
            _ => return DataType::Utf8,
        });
    }
    inferred.unwrap_or_else(|| affinity(declared))
}

fn affinity(declared: Option<&str>) -> DataType {
    match declared {
        Some(t) if t.contains("INT") => DataType::Int64,
        Some(t) if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") => {
            DataType::Float64
        }
        Some(t) if t.contains("BLOB") => DataType::Binary,
        _ => DataType::Utf8,
    }
}

#[allow(clippy::cast_precision_loss)]
fn build_array(rows: &[Vec<Value>], idx: usize, data_type: &DataType) -> ArrayRef {
    let column = rows.iter().map(|r| &r[idx]);
    match data_type {
        DataType::Int64 => Arc::new(
            column
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            column
                .map(|v| match v {
                    Value::Integer(i) => Some(*i as f64),
                    Value::Real(f) => Some(*f),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        DataType::Binary => {
            let mut builder = BinaryBuilder::new();
            for v in column {
                match v {
                    Value::Blob(b) => builder.append_value(b),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::new();
            for v in column {
                match v {
                    Value::Null => builder.append_null(),
                    Value::Integer(i) => builder.append_value(i.to_string()),
                    Value::Real(f) => builder.append_value(f.to_string()),
                    Value::Text(s) => builder.append_value(s),
                    Value::Blob(b) => builder.append_value(String::from_utf8_lossy(b)),
                }
            }
            Arc::new(builder.finish())
        }
    }
}
