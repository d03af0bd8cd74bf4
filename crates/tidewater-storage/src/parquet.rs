//! Parquet encoding/decoding for staged objects.
//!
//! A staged object holds one Arrow `RecordBatch` serialized as a single
//! Parquet file. The embedded Arrow schema keeps nullable integers,
//! timestamps, dates and times intact across the round trip.

use std::io::Cursor;

use arrow::compute::concat_batches;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use tidewater_types::{Classify, ErrorCategory};

/// Errors produced while encoding or decoding a staged object.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("staged object contains no record batches")]
    Empty,
}

impl Classify for CodecError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Data
    }
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("tidewater".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Serialize one batch as a Parquet file.
///
/// # Errors
///
/// Returns [`CodecError`] if the writer rejects the batch.
pub fn encode_batch(batch: &RecordBatch) -> Result<Bytes, CodecError> {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, batch.schema(), Some(writer_properties()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Read every record batch from a Parquet file.
///
/// # Errors
///
/// Returns [`CodecError`] if the bytes are not a readable Parquet file.
pub fn decode_batches(bytes: Bytes) -> Result<Vec<RecordBatch>, CodecError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Read a Parquet file into a single batch.
///
/// A file with zero rows still yields its schema through the reader, so
/// [`CodecError::Empty`] only occurs for files that carry no batches at all.
///
/// # Errors
///
/// Returns [`CodecError`] on decode failure.
pub fn decode_single(bytes: Bytes) -> Result<RecordBatch, CodecError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<Result<Vec<_>, ArrowError>>()?;
    if batches.is_empty() && schema.fields().is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(concat_batches(&schema, &batches)?)
}
