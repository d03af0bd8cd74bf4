//! Watermark store error types.

use tidewater_storage::StorageError;
use tidewater_types::{Classify, ErrorCategory};

/// Errors produced by [`WatermarkStore`](crate::WatermarkStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Storage failure other than an absent watermark object.
    #[error("watermark storage error: {0}")]
    Storage(#[from] StorageError),

    /// Watermark object exists but its body is not a Unix timestamp.
    #[error("watermark object holds '{body}', not a Unix timestamp")]
    Corrupt { body: String },
}

impl Classify for StateError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(e) => e.category(),
            Self::Corrupt { .. } => ErrorCategory::Data,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_displays_body() {
        let err = StateError::Corrupt {
            body: "yesterday".into(),
        };
        assert_eq!(
            err.to_string(),
            "watermark object holds 'yesterday', not a Unix timestamp"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn storage_error_wraps_and_keeps_category() {
        let err = StateError::from(StorageError::no_such_bucket("control_bucket"));
        assert!(err.to_string().contains("NoSuchBucket"));
        assert_eq!(err.category(), ErrorCategory::Config);
    }
}
