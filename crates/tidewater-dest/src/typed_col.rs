//! Typed Arrow column helpers used by the row-binding write paths.

use arrow::array::{
    Array, AsArray, BinaryArray, BooleanArray, Date32Array, Float32Array, Float64Array,
    Int16Array, Int32Array, Int64Array, StringArray, Time64MicrosecondArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Time64MicrosecondType, TimeUnit, TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tidewater_sql::DbError;

/// Pre-downcast Arrow column reference, resolved once per column per batch.
pub enum TypedCol<'a> {
    Int16(&'a Int16Array),
    Int32(&'a Int32Array),
    Int64(&'a Int64Array),
    Float32(&'a Float32Array),
    Float64(&'a Float64Array),
    Boolean(&'a BooleanArray),
    Utf8(&'a StringArray),
    TimestampMicros(&'a TimestampMicrosecondArray),
    Date32(&'a Date32Array),
    Time64Micros(&'a Time64MicrosecondArray),
    Binary(&'a BinaryArray),
    /// All-null column (Parquet `Null` logical type).
    Null,
}

/// Downcast every column of `batch`.
///
/// # Errors
///
/// Returns a schema-category [`DbError`] naming the first column whose Arrow
/// type has no SQL binding.
pub fn downcast_columns(batch: &RecordBatch) -> Result<Vec<TypedCol<'_>>, DbError> {
    let schema = batch.schema();
    batch
        .columns()
        .iter()
        .zip(schema.fields())
        .map(|(col, field)| {
            Ok(match col.data_type() {
                DataType::Int16 => TypedCol::Int16(col.as_primitive::<Int16Type>()),
                DataType::Int32 => TypedCol::Int32(col.as_primitive::<Int32Type>()),
                DataType::Int64 => TypedCol::Int64(col.as_primitive::<Int64Type>()),
                DataType::Float32 => TypedCol::Float32(col.as_primitive::<Float32Type>()),
                DataType::Float64 => TypedCol::Float64(col.as_primitive::<Float64Type>()),
                DataType::Boolean => TypedCol::Boolean(col.as_boolean()),
                DataType::Utf8 => TypedCol::Utf8(col.as_string::<i32>()),
                DataType::Timestamp(TimeUnit::Microsecond, _) => {
                    TypedCol::TimestampMicros(col.as_primitive::<TimestampMicrosecondType>())
                }
                DataType::Date32 => TypedCol::Date32(col.as_primitive::<Date32Type>()),
                DataType::Time64(TimeUnit::Microsecond) => {
                    TypedCol::Time64Micros(col.as_primitive::<Time64MicrosecondType>())
                }
                DataType::Binary => TypedCol::Binary(col.as_binary::<i32>()),
                DataType::Null => TypedCol::Null,
                other => {
                    return Err(DbError::schema(format!(
                        "column '{}' has unsupported type {other}",
                        field.name()
                    )))
                }
            })
        })
        .collect()
}

/// One cell, typed by its Arrow origin. `None` is SQL `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue<'a> {
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Boolean(Option<bool>),
    Text(Option<&'a str>),
    Timestamp(Option<NaiveDateTime>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Bytes(Option<&'a [u8]>),
    Null,
}

impl CellValue<'_> {
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            Self::Int16(v) => v.is_none(),
            Self::Int32(v) => v.is_none(),
            Self::Int64(v) => v.is_none(),
            Self::Float32(v) => v.is_none(),
            Self::Float64(v) => v.is_none(),
            Self::Boolean(v) => v.is_none(),
            Self::Text(v) => v.is_none(),
            Self::Timestamp(v) => v.is_none(),
            Self::Date(v) => v.is_none(),
            Self::Time(v) => v.is_none(),
            Self::Bytes(v) => v.is_none(),
            Self::Null => true,
        }
    }

    /// Integer value widened to `i64`, for integer cells.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int16(v) => v.map(i64::from),
            Self::Int32(v) => v.map(i64::from),
            Self::Int64(v) => *v,
            _ => None,
        }
    }

    /// Text rendering the database can parse back into its column type.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Int16(v) => v.map(|x| x.to_string()),
            Self::Int32(v) => v.map(|x| x.to_string()),
            Self::Int64(v) => v.map(|x| x.to_string()),
            Self::Float32(v) => v.map(|x| x.to_string()),
            Self::Float64(v) => v.map(|x| x.to_string()),
            Self::Boolean(v) => v.map(|x| x.to_string()),
            Self::Text(v) => v.map(str::to_string),
            Self::Timestamp(v) => v.map(|x| x.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Self::Date(v) => v.map(|x| x.format("%Y-%m-%d").to_string()),
            Self::Time(v) => v.map(|x| x.format("%H:%M:%S%.f").to_string()),
            Self::Bytes(v) => v.map(|b| String::from_utf8_lossy(b).into_owned()),
            Self::Null => None,
        }
    }
}

fn opt<A: Array, T>(arr: &A, row_idx: usize, value: impl FnOnce() -> T) -> Option<T> {
    if arr.is_null(row_idx) {
        None
    } else {
        Some(value())
    }
}

/// Cell at `row_idx` of `col`.
#[must_use]
pub fn cell_value<'a>(col: &TypedCol<'a>, row_idx: usize) -> CellValue<'a> {
    match *col {
        TypedCol::Null => CellValue::Null,
        TypedCol::Int16(arr) => CellValue::Int16(opt(arr, row_idx, || arr.value(row_idx))),
        TypedCol::Int32(arr) => CellValue::Int32(opt(arr, row_idx, || arr.value(row_idx))),
        TypedCol::Int64(arr) => CellValue::Int64(opt(arr, row_idx, || arr.value(row_idx))),
        TypedCol::Float32(arr) => CellValue::Float32(opt(arr, row_idx, || arr.value(row_idx))),
        TypedCol::Float64(arr) => CellValue::Float64(opt(arr, row_idx, || arr.value(row_idx))),
        TypedCol::Boolean(arr) => CellValue::Boolean(opt(arr, row_idx, || arr.value(row_idx))),
        TypedCol::Utf8(arr) => CellValue::Text(opt(arr, row_idx, || arr.value(row_idx))),
        TypedCol::TimestampMicros(arr) => {
            let micros = opt(arr, row_idx, || arr.value(row_idx));
            CellValue::Timestamp(
                micros
                    .and_then(DateTime::from_timestamp_micros)
                    .map(|dt| dt.naive_utc()),
            )
        }
        TypedCol::Date32(arr) => {
            let days = opt(arr, row_idx, || arr.value(row_idx));
            CellValue::Date(days.and_then(|d| {
                NaiveDate::default().checked_add_signed(chrono::Duration::days(i64::from(d)))
            }))
        }
        TypedCol::Time64Micros(arr) => {
            let micros = opt(arr, row_idx, || arr.value(row_idx));
            CellValue::Time(micros.and_then(time_from_micros))
        }
        TypedCol::Binary(arr) => CellValue::Bytes(opt(arr, row_idx, || arr.value(row_idx))),
    }
}

fn time_from_micros(micros: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, NullArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    #[test]
    fn cell_value_handles_numeric_and_nulls() {
        let arr = Int32Array::from(vec![Some(7), None]);
        let col = TypedCol::Int32(&arr);

        assert_eq!(cell_value(&col, 0), CellValue::Int32(Some(7)));
        assert_eq!(cell_value(&col, 1), CellValue::Int32(None));
        assert_eq!(cell_value(&col, 0).as_i64(), Some(7));
        assert!(cell_value(&col, 1).is_null());
    }

    #[test]
    fn cell_value_handles_utf8() {
        let arr = StringArray::from(vec![Some("alice"), None]);
        let col = TypedCol::Utf8(&arr);

        assert_eq!(cell_value(&col, 0), CellValue::Text(Some("alice")));
        assert_eq!(cell_value(&col, 1).to_text(), None);
    }

    #[test]
    fn downcast_columns_handles_temporal_and_binary() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("ts", DataType::Timestamp(TimeUnit::Microsecond, None), true),
            Field::new("d", DataType::Date32, true),
            Field::new("t", DataType::Time64(TimeUnit::Microsecond), true),
            Field::new("b", DataType::Binary, true),
            Field::new("n", DataType::Null, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMicrosecondArray::from(vec![Some(1_705_312_200_000_000i64)])),
            Arc::new(Date32Array::from(vec![Some(19737)])),
            Arc::new(Time64MicrosecondArray::from(vec![Some(51_649_962_000i64)])),
            Arc::new(BinaryArray::from(vec![Some(b"test" as &[u8])])),
            Arc::new(NullArray::new(1)),
        ];
        let batch = RecordBatch::try_new(schema, columns).unwrap();

        let cols = downcast_columns(&batch).unwrap();
        assert!(matches!(cols[0], TypedCol::TimestampMicros(_)));
        assert!(matches!(cols[1], TypedCol::Date32(_)));
        assert!(matches!(cols[2], TypedCol::Time64Micros(_)));
        assert!(matches!(cols[3], TypedCol::Binary(_)));
        assert!(matches!(cols[4], TypedCol::Null));
    }

    #[test]
    fn unsupported_type_is_a_schema_error() {
        let schema = Arc::new(Schema::new(vec![Field::new("u", DataType::UInt8, true)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(arrow::array::UInt8Array::from(vec![1u8])) as ArrayRef],
        )
        .unwrap();
        let err = downcast_columns(&batch).err().unwrap();
        assert!(err.to_string().contains("'u'"));
    }

    #[test]
    fn temporal_cells_render_as_text() {
        // 2024-01-15 09:50:00 UTC
        let ts = TimestampMicrosecondArray::from(vec![Some(1_705_312_200_000_000i64)]);
        let value = cell_value(&TypedCol::TimestampMicros(&ts), 0);
        assert_eq!(value.to_text().unwrap(), "2024-01-15 09:50:00");

        let d = Date32Array::from(vec![Some(19737), None]);
        assert_eq!(cell_value(&TypedCol::Date32(&d), 0).to_text().unwrap(), "2024-01-15");
        assert_eq!(cell_value(&TypedCol::Date32(&d), 1), CellValue::Date(None));

        let t = Time64MicrosecondArray::from(vec![Some(51_649_962_000i64)]);
        assert_eq!(cell_value(&TypedCol::Time64Micros(&t), 0).to_text().unwrap(), "14:20:49.962");
    }

    #[test]
    fn binary_cells_keep_bytes() {
        let arr = BinaryArray::from(vec![Some(b"hello" as &[u8]), None]);
        let col = TypedCol::Binary(&arr);
        assert_eq!(cell_value(&col, 0), CellValue::Bytes(Some(b"hello")));
        assert!(cell_value(&col, 1).is_null());
    }
}
