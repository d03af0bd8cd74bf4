//! Watermark store trait definition.

use chrono::{DateTime, Utc};

use crate::error;

/// Storage contract for the extraction watermark.
///
/// The extractor reads the watermark once at the start of a run and writes
/// it once after every table has been staged. Nothing is cached across runs.
pub trait WatermarkStore: Send + Sync {
    /// Read the last successful extraction time.
    ///
    /// Returns `Ok(None)` when no watermark has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure or
    /// an unreadable watermark.
    fn load(&self) -> error::Result<Option<DateTime<Utc>>>;

    /// Persist `at` as the last successful extraction time.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn save(&self, at: DateTime<Utc>) -> error::Result<()>;
}
