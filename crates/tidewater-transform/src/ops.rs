//! Column operations over Arrow batches.
//!
//! Operations run in order against a working column set; the batch is
//! rebuilt once at the end. Appended columns go to the end of the schema,
//! renames keep their position.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, Date32Builder, StringArray, Time64MicrosecondBuilder,
};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, TimeUnit, TimestampMicrosecondType};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::FormatOptions;

use crate::currency::currency_name;
use crate::error::{Result, TransformError};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Column holding the ISO-4217 code the currency-name lookup reads.
pub const CURRENCY_CODE_COLUMN: &str = "currency_code";
/// Column the currency-name lookup appends.
pub const CURRENCY_NAME_COLUMN: &str = "currency_name";

/// One step of a table transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOp {
    /// Append `to` as a copy of `from`, replacing `to` if it already exists.
    Copy {
        from: &'static str,
        to: &'static str,
    },
    /// Append a `Date32` and a `Time64(µs)` column derived from a
    /// timestamp (or timestamp string) column.
    Split {
        source: &'static str,
        date: &'static str,
        time: &'static str,
    },
    /// Rename `from` to `to` in place.
    Rename {
        from: &'static str,
        to: &'static str,
    },
    Drop(&'static str),
    /// Append `currency_name` looked up from `currency_code`.
    CurrencyName,
}

impl ColumnOp {
    fn apply(self, cols: &mut Columns) -> Result<()> {
        match self {
            Self::Copy { from, to } => {
                let idx = cols.index_of(from)?;
                let field = cols.fields[idx].as_ref().clone().with_name(to);
                let array = cols.arrays[idx].clone();
                cols.put(field, array);
            }
            Self::Split { source, date, time } => {
                let idx = cols.index_of(source)?;
                let (dates, times) = split_timestamp(source, &cols.arrays[idx])?;
                cols.put(Field::new(date, DataType::Date32, true), dates);
                cols.put(
                    Field::new(time, DataType::Time64(TimeUnit::Microsecond), true),
                    times,
                );
            }
            Self::Rename { from, to } => {
                let idx = cols.index_of(from)?;
                cols.fields[idx] = Arc::new(cols.fields[idx].as_ref().clone().with_name(to));
            }
            Self::Drop(name) => {
                let idx = cols.index_of(name)?;
                cols.fields.remove(idx);
                cols.arrays.remove(idx);
            }
            Self::CurrencyName => {
                let idx = cols.index_of(CURRENCY_CODE_COLUMN)?;
                let codes = cols.arrays[idx].as_string_opt::<i32>().ok_or_else(|| {
                    TransformError::UnsupportedType {
                        column: CURRENCY_CODE_COLUMN.to_string(),
                        data_type: cols.arrays[idx].data_type().clone(),
                    }
                })?;
                let names: StringArray = codes.iter().map(|c| c.and_then(currency_name)).collect();
                cols.put(
                    Field::new(CURRENCY_NAME_COLUMN, DataType::Utf8, true),
                    Arc::new(names),
                );
            }
        }
        Ok(())
    }
}

/// Run `ops` in order over `batch`.
///
/// # Errors
///
/// Returns [`TransformError::MissingColumn`] when an operation names a column
/// the batch (as transformed so far) does not have, or a type/value error
/// from a split or lookup.
pub fn apply_ops(batch: &RecordBatch, ops: &[ColumnOp]) -> Result<RecordBatch> {
    let mut cols = Columns::from_batch(batch);
    for op in ops {
        op.apply(&mut cols)?;
    }
    cols.finish(batch.num_rows())
}

struct Columns {
    fields: Vec<FieldRef>,
    arrays: Vec<ArrayRef>,
}

impl Columns {
    fn from_batch(batch: &RecordBatch) -> Self {
        Self {
            fields: batch.schema().fields().iter().cloned().collect(),
            arrays: batch.columns().to_vec(),
        }
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| TransformError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Replace a same-named column, or append.
    fn put(&mut self, field: Field, array: ArrayRef) {
        match self.fields.iter().position(|f| f.name() == field.name()) {
            Some(idx) => {
                self.fields[idx] = Arc::new(field);
                self.arrays[idx] = array;
            }
            None => {
                self.fields.push(Arc::new(field));
                self.arrays.push(array);
            }
        }
    }

    fn finish(self, num_rows: usize) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(self.fields));
        // Explicit row count keeps batches valid even when every column was dropped.
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        RecordBatch::try_new_with_options(schema, self.arrays, &options).map_err(|source| {
            TransformError::Value {
                column: "*".to_string(),
                source,
            }
        })
    }
}

fn strict_cast() -> CastOptions<'static> {
    CastOptions {
        safe: false,
        format_options: FormatOptions::default(),
    }
}

fn split_timestamp(name: &str, array: &ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    let micros = match array.data_type() {
        DataType::Timestamp(_, _) | DataType::Utf8 | DataType::LargeUtf8 => cast_with_options(
            array,
            &DataType::Timestamp(TimeUnit::Microsecond, None),
            &strict_cast(),
        )
        .map_err(|source| TransformError::Value {
            column: name.to_string(),
            source,
        })?,
        other => {
            return Err(TransformError::UnsupportedType {
                column: name.to_string(),
                data_type: other.clone(),
            })
        }
    };

    let ts = micros.as_primitive::<TimestampMicrosecondType>();
    let mut dates = Date32Builder::with_capacity(ts.len());
    let mut times = Time64MicrosecondBuilder::with_capacity(ts.len());
    for value in ts {
        match value {
            Some(us) => {
                // Any i64 microsecond count is within +/-106_751_992 days.
                #[allow(clippy::cast_possible_truncation)]
                dates.append_value(us.div_euclid(MICROS_PER_DAY) as i32);
                times.append_value(us.rem_euclid(MICROS_PER_DAY));
            }
            None => {
                dates.append_null();
                times.append_null();
            }
        }
    }
    Ok((Arc::new(dates.finish()), Arc::new(times.finish())))
}
