//! Extraction run orchestration.
//!
//! A run reads the watermark once, stages every dimension table, optionally
//! pauses, stages every fact table, then advances the watermark. Any failure
//! other than an unavailable table leaves the watermark where it was, so the
//! next run re-extracts the same window.

use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};
use tidewater_sql::DbError;
use tidewater_state::{StateError, WatermarkStore};
use tidewater_storage::{encode_batch, CodecError, ObjectStore, StorageError};
use tidewater_types::event::{EventError, ExtractTrigger};
use tidewater_types::table::{DIMENSION_TABLES, FACT_TABLES};
use tidewater_types::{Classify, ErrorCategory, KeyError, SourceTable, StagedKey};

use crate::query::{build_extract_query, CatalogNames};
use crate::source::RelationalSource;

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Bucket staged objects are written to.
    pub bucket: String,
    /// Pause between the dimension and fact phases. `None` skips it.
    pub phase_delay: Option<Duration>,
}

impl ExtractSettings {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            phase_delay: None,
        }
    }

    #[must_use]
    pub fn with_phase_delay(mut self, delay: Duration) -> Self {
        self.phase_delay = Some(delay);
        self
    }
}

/// How an extraction run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every table was processed and the watermark advanced.
    Completed {
        staged: Vec<StagedKey>,
        empty: Vec<SourceTable>,
        watermark: DateTime<Utc>,
    },
    /// A table was absent or unreadable; nothing further was extracted and
    /// the watermark was left unchanged.
    Halted { table: SourceTable, reason: String },
}

/// Errors that abort an extraction run.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("staging failed: {0}")]
    Storage(#[from] StorageError),

    #[error("{}: {source}", source_context(.table))]
    Source {
        table: Option<SourceTable>,
        #[source]
        source: DbError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Event(#[from] EventError),
}

#[allow(clippy::ref_option)]
fn source_context(table: &Option<SourceTable>) -> String {
    match table {
        Some(t) => format!("extracting '{t}' failed"),
        None => "reading the source catalog failed".to_string(),
    }
}

impl Classify for ExtractError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::State(e) => e.category(),
            Self::Storage(e) => e.category(),
            Self::Source { source, .. } => source.category(),
            Self::Codec(e) => e.category(),
            Self::Key(e) => e.category(),
            Self::Event(e) => e.category(),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ExtractError>;

enum TableResult {
    Staged(StagedKey),
    Empty,
}

/// Incremental extractor bound to one source, object store and watermark.
pub struct Extractor<'a> {
    source: &'a mut dyn RelationalSource,
    objects: &'a dyn ObjectStore,
    watermarks: &'a dyn WatermarkStore,
    settings: ExtractSettings,
}

impl<'a> Extractor<'a> {
    pub fn new(
        source: &'a mut dyn RelationalSource,
        objects: &'a dyn ObjectStore,
        watermarks: &'a dyn WatermarkStore,
        settings: ExtractSettings,
    ) -> Self {
        Self {
            source,
            objects,
            watermarks,
            settings,
        }
    }

    /// Decode a `{ "time": ... }` trigger and run.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Event`] for a malformed trigger, otherwise as
    /// [`run`](Self::run).
    pub fn handle_event(&mut self, body: &str) -> Result<RunOutcome> {
        let trigger = ExtractTrigger::from_json(body)?;
        let at = trigger.event_time()?;
        self.run(at)
    }

    /// Extract `[watermark, trigger_time)` for every allow-listed table.
    ///
    /// # Errors
    ///
    /// Returns an error on any failure other than an unavailable table; the
    /// watermark is not advanced in that case.
    pub fn run(&mut self, trigger_time: DateTime<Utc>) -> Result<RunOutcome> {
        let started = Instant::now();
        let result = self.run_inner(trigger_time);
        match &result {
            Ok(RunOutcome::Completed { staged, empty, .. }) => tracing::info!(
                staged = staged.len(),
                empty = empty.len(),
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Extraction run completed"
            ),
            Ok(RunOutcome::Halted { table, .. }) => {
                tracing::info!(table = %table, "Extraction run halted; watermark unchanged");
            }
            Err(ExtractError::Storage(e)) => tracing::error!(
                bucket = %e.bucket,
                code = %e.code,
                message = %e.message,
                "Storage access failed; watermark unchanged"
            ),
            Err(e) => tracing::error!(
                error = %e,
                category = %e.category(),
                "Extraction run failed; watermark unchanged"
            ),
        }
        result
    }

    fn run_inner(&mut self, trigger_time: DateTime<Utc>) -> Result<RunOutcome> {
        let since = self.watermarks.load()?;
        let until = trigger_time.naive_utc();
        tracing::info!(
            since = ?since,
            until = %trigger_time,
            bucket = %self.settings.bucket,
            "Starting extraction run"
        );

        let present = self.present_tables()?;
        let since = since.map(|s| s.naive_utc());

        let mut staged = Vec::new();
        let mut empty = Vec::new();

        for (phase, tables) in [("dimension", &DIMENSION_TABLES[..]), ("fact", &FACT_TABLES[..])] {
            if phase == "fact" {
                if let Some(delay) = self.settings.phase_delay {
                    tracing::info!(delay_secs = delay.as_secs(), "Pausing before fact tables");
                    std::thread::sleep(delay);
                }
            }
            for &table in tables {
                if !present.contains(table) {
                    tracing::debug!(table = %table, phase, "Table not in source catalog; skipping");
                    continue;
                }
                match self.extract_table(table, &present, since, until) {
                    Ok(TableResult::Staged(key)) => staged.push(key),
                    Ok(TableResult::Empty) => empty.push(table),
                    Err(ExtractError::Source { source, .. }) if source.is_table_unavailable() => {
                        tracing::info!(table = %table, reason = %source, "Table unavailable");
                        return Ok(RunOutcome::Halted {
                            table,
                            reason: source.message,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.watermarks.save(trigger_time)?;
        Ok(RunOutcome::Completed {
            staged,
            empty,
            watermark: trigger_time,
        })
    }

    fn present_tables(&mut self) -> Result<CatalogNames> {
        let names = self
            .source
            .table_names()
            .map_err(|source| ExtractError::Source {
                table: None,
                source,
            })?;
        let present = CatalogNames::from_catalog(&names);
        tracing::debug!(catalog = names.len(), allowed = present.len(), "Resolved source tables");
        Ok(present)
    }

    /// Stage one table's window. An empty result writes nothing.
    fn extract_table(
        &mut self,
        table: SourceTable,
        names: &CatalogNames,
        since: Option<NaiveDateTime>,
        until: NaiveDateTime,
    ) -> Result<TableResult> {
        let query = build_extract_query(table, names, since, until, self.source.dialect());
        tracing::debug!(table = %table, sql = %query.sql, "Extracting table");

        let batch = self
            .source
            .fetch(&query)
            .map_err(|source| ExtractError::Source {
                table: Some(table),
                source,
            })?;
        if batch.num_rows() == 0 {
            tracing::info!(table = %table, "No changed rows; nothing staged");
            return Ok(TableResult::Empty);
        }

        let key = StagedKey::new(until, table.name())?;
        let body = encode_batch(&batch)?;
        self.objects
            .put(&self.settings.bucket, &key.to_string(), body)?;
        tracing::info!(
            table = %table,
            rows = batch.num_rows(),
            bucket = %self.settings.bucket,
            key = %key,
            "Staged table"
        );
        Ok(TableResult::Staged(key))
    }
}
