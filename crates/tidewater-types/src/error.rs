//! Error classification shared by every pipeline step.
//!
//! Each crate defines its own `thiserror` enum; [`Classify`] maps those
//! errors onto an [`ErrorCategory`] so an invoking harness can decide whether
//! redelivery is worthwhile.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a pipeline error.
///
/// Determines whether the invoking trigger should redeliver the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid configuration or trigger payload.
    Config,
    /// Insufficient permissions on a database object.
    Permission,
    /// Queried table does not exist (expected absence).
    TableUnavailable,
    /// Transient network error (retryable).
    TransientNetwork,
    /// Transient database error: connection loss, deadlock, serialization (retryable).
    TransientDb,
    /// Object storage failure other than a missing key (retryable).
    Storage,
    /// Staged object key does not follow the key schema.
    Key,
    /// Table name has no registered relation.
    Lookup,
    /// Invalid or corrupt data.
    Data,
    /// Schema mismatch between a staged object and its target.
    Schema,
    /// Internal error.
    Internal,
}

impl ErrorCategory {
    /// Whether an invocation failing with this category should be redelivered.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::TransientNetwork | Self::TransientDb | Self::Storage
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Permission => "permission",
            Self::TableUnavailable => "table_unavailable",
            Self::TransientNetwork => "transient_network",
            Self::TransientDb => "transient_db",
            Self::Storage => "storage",
            Self::Key => "key",
            Self::Lookup => "lookup",
            Self::Data => "data",
            Self::Schema => "schema",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Errors that can be mapped onto an [`ErrorCategory`].
pub trait Classify {
    /// Classification of this error.
    fn category(&self) -> ErrorCategory;

    /// Shorthand for `self.category().is_retryable()`.
    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Classify a SQLSTATE code.
///
/// Class `08` (connection exception) and class `40` (transaction rollback,
/// including deadlock and serialization failure) are transient. Undefined
/// table and insufficient privilege are reported as expected absence.
#[must_use]
pub fn category_for_sqlstate(code: &str) -> ErrorCategory {
    match code {
        "42P01" | "42501" => ErrorCategory::TableUnavailable,
        "53300" | "57P01" | "57P02" | "57P03" => ErrorCategory::TransientDb,
        _ => match code.get(..2) {
            Some("08" | "40") => ErrorCategory::TransientDb,
            Some("22" | "23") => ErrorCategory::Data,
            Some("42") => ErrorCategory::Schema,
            Some("28") => ErrorCategory::Permission,
            _ => ErrorCategory::Internal,
        },
    }
}
