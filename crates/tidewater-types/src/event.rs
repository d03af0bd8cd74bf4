//! Trigger event payloads.
//!
//! The extractor is triggered by `{ "time": "<ISO-8601>" }`. The transformer
//! and loader are triggered by an object-creation notification carrying one
//! record with a bucket name and an object key.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Classify, ErrorCategory};

/// Errors produced while decoding a trigger event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invalid event payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event time '{0}' is not an ISO-8601 timestamp")]
    BadTime(String),

    #[error("notification must carry exactly one record, got {0}")]
    RecordCount(usize),
}

impl Classify for EventError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

/// Payload that starts an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractTrigger {
    pub time: String,
}

impl ExtractTrigger {
    /// Decode a trigger from its JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Json`] when `time` is missing or not a string.
    pub fn from_json(body: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(body)?)
    }

    /// The run's upper extraction bound.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::BadTime`] when `time` does not parse.
    pub fn event_time(&self) -> Result<DateTime<Utc>, EventError> {
        parse_event_time(&self.time)
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are read as UTC.
///
/// # Errors
///
/// Returns [`EventError::BadTime`] when no accepted format matches.
pub fn parse_event_time(raw: &str) -> Result<DateTime<Utc>, EventError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| EventError::BadTime(raw.to_string()))
}

/// Object-creation notification, in the shape emitted by S3-compatible stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectNotification {
    #[serde(rename = "Records")]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
}

/// A bucket/key pair naming one newly created object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectNotification {
    /// Decode a notification from its JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Json`] on malformed payloads.
    pub fn from_json(body: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Build a single-record notification.
    #[must_use]
    pub fn single(bucket: &str, key: &str) -> Self {
        Self {
            records: vec![NotificationRecord {
                s3: S3Entity {
                    bucket: BucketEntity {
                        name: bucket.to_string(),
                    },
                    object: ObjectEntity {
                        key: key.to_string(),
                    },
                },
            }],
        }
    }

    /// The one object this notification names, with escaped colons restored.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::RecordCount`] unless exactly one record is present.
    pub fn object(&self) -> Result<ObjectRef, EventError> {
        match self.records.as_slice() {
            [record] => Ok(ObjectRef {
                bucket: record.s3.bucket.name.clone(),
                key: unescape_key(&record.s3.object.key),
            }),
            other => Err(EventError::RecordCount(other.len())),
        }
    }
}

/// Restore `:` characters that notification systems URL-escape in keys.
#[must_use]
pub fn unescape_key(key: &str) -> String {
    key.replace("%3A", ":").replace("%3a", ":")
}
