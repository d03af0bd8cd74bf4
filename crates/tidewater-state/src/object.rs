//! Watermark kept as a plain-text object in the control bucket.
//!
//! The body is a floating-point Unix timestamp in seconds, e.g.
//! `1707821118.000000`.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tidewater_storage::ObjectStore;

use crate::backend::WatermarkStore;
use crate::error::{Result, StateError};

/// Well-known key of the watermark object.
pub const WATERMARK_KEY: &str = "last_successful_extraction.txt";

/// [`WatermarkStore`] over an [`ObjectStore`] bucket.
pub struct ObjectWatermarkStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
}

impl ObjectWatermarkStore {
    /// Watermark at [`WATERMARK_KEY`] in `bucket`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: WATERMARK_KEY.to_string(),
        }
    }

    /// Override the object key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

impl WatermarkStore for ObjectWatermarkStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let body = match self.store.get(&self.bucket, &self.key) {
            Ok(body) => body,
            Err(e) if e.is_no_such_key() => {
                tracing::info!(bucket = %self.bucket, key = %self.key, "No watermark found");
                return Ok(None);
            }
            Err(e) => return Err(StateError::Storage(e)),
        };
        let text = String::from_utf8_lossy(&body);
        let at = parse_watermark(&text).ok_or_else(|| StateError::Corrupt {
            body: text.trim().to_string(),
        })?;
        tracing::info!(bucket = %self.bucket, watermark = %at, "Watermark loaded");
        Ok(Some(at))
    }

    fn save(&self, at: DateTime<Utc>) -> Result<()> {
        let body = format_watermark(at);
        self.store
            .put(&self.bucket, &self.key, Bytes::from(body))?;
        tracing::info!(bucket = %self.bucket, watermark = %at, "Watermark advanced");
        Ok(())
    }
}

/// Render a watermark body with microsecond precision.
#[must_use]
pub fn format_watermark(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

/// Parse a watermark body.
///
/// Non-negative values are parsed digit-by-digit so sub-second precision is
/// not lost to `f64` rounding; anything else goes through `f64`.
#[must_use]
pub fn parse_watermark(body: &str) -> Option<DateTime<Utc>> {
    let trimmed = body.trim();
    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    let exact = !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit());
    if exact {
        let secs: i64 = whole.parse().ok()?;
        let nanos_text: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
        let nanos: u32 = nanos_text.parse().ok()?;
        return DateTime::from_timestamp(secs, nanos);
    }

    let value: f64 = trimmed.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let secs = value.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = (((value - secs) * 1e9).round() as u32).min(999_999_999);
    #[allow(clippy::cast_possible_truncation)]
    DateTime::from_timestamp(secs as i64, nanos)
}
