//! Staged object key schema: `{run_time}/{table}.pqt`.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Classify, ErrorCategory};

/// File extension of staged Parquet objects.
pub const STAGED_EXTENSION: &str = "pqt";

/// Run-time prefix format, e.g. `2024-02-15T19:01:53`.
pub const RUN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const RUN_DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors produced when parsing a staged object key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key '{0}' has no run-time prefix")]
    MissingPrefix(String),

    #[error("key '{0}' has more than one '/' separator")]
    TooManySegments(String),

    #[error("key '{key}' must end in '.pqt'")]
    BadExtension { key: String },

    #[error("run-time prefix '{0}' is not a timestamp")]
    BadRunTime(String),

    #[error("table segment '{0}' is not a valid table name")]
    BadTable(String),
}

impl Classify for KeyError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Key
    }
}

/// Structured form of a staged object key.
///
/// The table segment is validated as an identifier but not checked against
/// the table registry; resolving it to a relation is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagedKey {
    prefix: String,
    run_time: NaiveDateTime,
    table: String,
}

impl StagedKey {
    /// Build the key for a table staged by the run at `run_time`.
    ///
    /// Sub-second precision is dropped from the prefix.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::BadTable`] when `table` is not a plain identifier.
    pub fn new(run_time: NaiveDateTime, table: &str) -> Result<Self, KeyError> {
        validate_table_segment(table)?;
        let prefix = run_time.format(RUN_TIME_FORMAT).to_string();
        let run_time = parse_run_time(&prefix)?;
        Ok(Self {
            prefix,
            run_time,
            table: table.to_string(),
        })
    }

    /// Parse a raw object key.
    ///
    /// Accepts a full `YYYY-MM-DDTHH:MM:SS` prefix or a bare `YYYY-MM-DD`
    /// date (read as midnight).
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] describing the first violated rule.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let (prefix, file) = key
            .split_once('/')
            .ok_or_else(|| KeyError::MissingPrefix(key.to_string()))?;
        if prefix.is_empty() {
            return Err(KeyError::MissingPrefix(key.to_string()));
        }
        if file.contains('/') {
            return Err(KeyError::TooManySegments(key.to_string()));
        }
        let table = file
            .strip_suffix(STAGED_EXTENSION)
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(|| KeyError::BadExtension {
                key: key.to_string(),
            })?;
        validate_table_segment(table)?;
        let run_time = parse_run_time(prefix)?;

        Ok(Self {
            prefix: prefix.to_string(),
            run_time,
            table: table.to_string(),
        })
    }

    #[must_use]
    pub fn run_time(&self) -> NaiveDateTime {
        self.run_time
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

fn parse_run_time(prefix: &str) -> Result<NaiveDateTime, KeyError> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(prefix, RUN_TIME_FORMAT) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(prefix, RUN_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| KeyError::BadRunTime(prefix.to_string()))
}

fn validate_table_segment(table: &str) -> Result<(), KeyError> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(KeyError::BadTable(table.to_string()))
    }
}

impl fmt::Display for StagedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{STAGED_EXTENSION}", self.prefix, self.table)
    }
}

impl FromStr for StagedKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
