//! Transformer error types.

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use tidewater_storage::{CodecError, StorageError};
use tidewater_types::event::EventError;
use tidewater_types::{Classify, ErrorCategory, KeyError};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("no transform registered for table '{table}'")]
    UnknownTable { table: String },

    #[error("staged object storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An operation referenced a column the batch does not carry.
    #[error("column '{column}' not found")]
    MissingColumn { column: String },

    #[error("column '{column}' has type {data_type}, which this operation cannot read")]
    UnsupportedType { column: String, data_type: DataType },

    /// A value could not be converted, e.g. an unparsable timestamp string.
    #[error("column '{column}': {source}")]
    Value {
        column: String,
        #[source]
        source: ArrowError,
    },

    #[error(transparent)]
    Event(#[from] EventError),
}

impl Classify for TransformError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Key(e) => e.category(),
            Self::UnknownTable { .. } => ErrorCategory::Lookup,
            Self::Storage(e) => e.category(),
            Self::Codec(e) => e.category(),
            Self::MissingColumn { .. } | Self::UnsupportedType { .. } => ErrorCategory::Schema,
            Self::Value { .. } => ErrorCategory::Data,
            Self::Event(e) => e.category(),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TransformError>;
