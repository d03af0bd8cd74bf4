//! Object storage error types.

use std::fmt;

use tidewater_types::{Classify, ErrorCategory};

/// Storage error code, named after the S3 error codes operators search logs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorCode {
    NoSuchKey,
    NoSuchBucket,
    AccessDenied,
    InvalidKey,
    Internal,
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::AccessDenied => "AccessDenied",
            Self::InvalidKey => "InvalidKey",
            Self::Internal => "InternalError",
        };
        f.write_str(s)
    }
}

/// Errors produced by [`ObjectStore`](crate::ObjectStore) operations.
#[derive(Debug, thiserror::Error)]
#[error("{code} (bucket: {bucket}): {message}")]
pub struct StorageError {
    pub code: StorageErrorCode,
    pub bucket: String,
    pub message: String,
}

impl StorageError {
    #[must_use]
    pub fn new(code: StorageErrorCode, bucket: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            bucket: bucket.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn no_such_key(bucket: &str, key: &str) -> Self {
        Self::new(
            StorageErrorCode::NoSuchKey,
            bucket,
            format!("the specified key does not exist: {key}"),
        )
    }

    #[must_use]
    pub fn no_such_bucket(bucket: &str) -> Self {
        Self::new(
            StorageErrorCode::NoSuchBucket,
            bucket,
            "the specified bucket does not exist",
        )
    }

    /// Map an I/O failure on `bucket` onto a storage code.
    #[must_use]
    pub fn io(bucket: &str, err: &std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::PermissionDenied => StorageErrorCode::AccessDenied,
            _ => StorageErrorCode::Internal,
        };
        Self::new(code, bucket, err.to_string())
    }

    /// Whether this error means the key is absent.
    #[must_use]
    pub fn is_no_such_key(&self) -> bool {
        self.code == StorageErrorCode::NoSuchKey
    }
}

impl Classify for StorageError {
    fn category(&self) -> ErrorCategory {
        match self.code {
            StorageErrorCode::AccessDenied => ErrorCategory::Permission,
            StorageErrorCode::NoSuchBucket | StorageErrorCode::InvalidKey => ErrorCategory::Config,
            StorageErrorCode::NoSuchKey | StorageErrorCode::Internal => ErrorCategory::Storage,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code_and_bucket() {
        let err = StorageError::no_such_key("control_bucket", "last_successful_extraction.txt");
        assert_eq!(
            err.to_string(),
            "NoSuchKey (bucket: control_bucket): the specified key does not exist: \
             last_successful_extraction.txt"
        );
        assert!(err.is_no_such_key());
    }

    #[test]
    fn permission_denied_io_maps_to_access_denied() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = StorageError::io("ingestion", &inner);
        assert_eq!(err.code, StorageErrorCode::AccessDenied);
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert!(!err.is_retryable());
    }

    #[test]
    fn internal_errors_are_retryable() {
        let inner = std::io::Error::other("disk hiccup");
        let err = StorageError::io("ingestion", &inner);
        assert_eq!(err.code, StorageErrorCode::Internal);
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_bucket_is_terminal() {
        assert!(!StorageError::no_such_bucket("nope").is_retryable());
    }
}
