//! Arrow `RecordBatch` encoding from `PostgreSQL` rows.
//!
//! Converts `postgres::Row` slices into a `RecordBatch` using the `Column`
//! type registry. A value that fails to decode is an error rather than a
//! silent null.

use std::sync::{Arc, LazyLock};

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, StringBuilder, Time64MicrosecondArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use postgres::types::{FromSql, Type};
use postgres::Row;
use tidewater_sql::DbError;

use crate::types::Column;

static UNIX_EPOCH_DATE: LazyLock<NaiveDate> = LazyLock::new(NaiveDate::default);

/// Build an Arrow `Schema` from column definitions. Every field is nullable.
#[must_use]
pub fn arrow_schema(columns: &[Column]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|col| Field::new(&col.name, col.data_type.clone(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Encode `PostgreSQL` rows into an Arrow `RecordBatch`.
///
/// # Errors
///
/// Returns a data-category [`DbError`] if a value cannot be decoded into its
/// column's Arrow type.
pub fn rows_to_record_batch(rows: &[Row], columns: &[Column]) -> Result<RecordBatch, DbError> {
    let schema = arrow_schema(columns);
    let arrays = columns
        .iter()
        .enumerate()
        .map(|(i, col)| encode_column(rows, i, col))
        .collect::<Result<Vec<_>, _>>()?;

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| DbError::data(format!("failed to create RecordBatch: {e}")))
}

fn values<'a, T: FromSql<'a>>(
    rows: &'a [Row],
    idx: usize,
    col: &Column,
) -> Result<Vec<Option<T>>, DbError> {
    rows.iter()
        .map(|r| {
            r.try_get::<_, Option<T>>(idx).map_err(|e| {
                DbError::data(format!(
                    "column '{}' ({}): {e}",
                    col.name, col.pg_type
                ))
            })
        })
        .collect()
}

fn encode_column(rows: &[Row], idx: usize, col: &Column) -> Result<ArrayRef, DbError> {
    let array: ArrayRef = match &col.data_type {
        DataType::Int16 => Arc::new(Int16Array::from(values::<i16>(rows, idx, col)?)),
        DataType::Int32 => Arc::new(Int32Array::from(values::<i32>(rows, idx, col)?)),
        DataType::Int64 => Arc::new(Int64Array::from(values::<i64>(rows, idx, col)?)),
        DataType::Float32 => Arc::new(Float32Array::from(values::<f32>(rows, idx, col)?)),
        DataType::Float64 => Arc::new(Float64Array::from(values::<f64>(rows, idx, col)?)),
        DataType::Boolean => Arc::new(BooleanArray::from(values::<bool>(rows, idx, col)?)),
        DataType::Timestamp(TimeUnit::Microsecond, _) => encode_timestamp(rows, idx, col)?,
        DataType::Date32 => {
            let days = values::<NaiveDate>(rows, idx, col)?
                .into_iter()
                .map(|d| d.map(days_since_epoch))
                .collect::<Vec<_>>();
            Arc::new(Date32Array::from(days))
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let micros = values::<NaiveTime>(rows, idx, col)?
                .into_iter()
                .map(|t| t.map(micros_since_midnight))
                .collect::<Vec<_>>();
            Arc::new(Time64MicrosecondArray::from(micros))
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::with_capacity(rows.len(), rows.len() * 64);
            for v in values::<Vec<u8>>(rows, idx, col)? {
                builder.append_option(v);
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 32);
            for v in values::<String>(rows, idx, col)? {
                builder.append_option(v);
            }
            Arc::new(builder.finish())
        }
    };
    Ok(array)
}

fn encode_timestamp(rows: &[Row], idx: usize, col: &Column) -> Result<ArrayRef, DbError> {
    // TIMESTAMP and TIMESTAMPTZ use different FromSql impls.
    let micros: Vec<Option<i64>> = if col_is_tz(rows, idx) {
        values::<DateTime<Utc>>(rows, idx, col)?
            .into_iter()
            .map(|v| v.map(|dt| dt.timestamp_micros()))
            .collect()
    } else {
        values::<NaiveDateTime>(rows, idx, col)?
            .into_iter()
            .map(|v| v.map(|dt| dt.and_utc().timestamp_micros()))
            .collect()
    };
    Ok(Arc::new(TimestampMicrosecondArray::from(micros)))
}

fn col_is_tz(rows: &[Row], idx: usize) -> bool {
    rows.first()
        .is_some_and(|r| r.columns()[idx].type_() == &Type::TIMESTAMPTZ)
}

fn days_since_epoch(d: NaiveDate) -> i32 {
    // Date32 is days since epoch; realistic dates always fit.
    #[allow(clippy::cast_possible_truncation)]
    let days = (d - *UNIX_EPOCH_DATE).num_days() as i32;
    days
}

fn micros_since_midnight(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) * 1_000_000 + i64::from(t.nanosecond() / 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_fields_are_nullable() {
        let cols = vec![Column::new("id", "int4"), Column::new("price", "numeric")];
        let schema = arrow_schema(&cols);
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.fields().iter().all(|f| f.is_nullable()));
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    }

    #[test]
    fn epoch_offsets() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
        let t = NaiveTime::from_hms_micro_opt(14, 20, 49, 962_000).unwrap();
        assert_eq!(micros_since_midnight(t), 51_649_962_000);
    }

    #[test]
    fn empty_rows_encode_empty_batch() {
        let cols = vec![Column::new("id", "int4"), Column::new("at", "timestamp")];
        let batch = rows_to_record_batch(&[], &cols).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 2);
    }
}
