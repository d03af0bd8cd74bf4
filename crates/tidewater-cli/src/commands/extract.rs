use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tidewater_source::{
    ExtractSettings, Extractor, PostgresSource, RelationalSource, RunOutcome, SqliteSource,
};
use tidewater_sql::DbConfig;
use tidewater_state::ObjectWatermarkStore;
use tidewater_storage::ObjectStore;
use tidewater_types::event::parse_event_time;

use super::{open_store, read_event};
use crate::config::PipelineConfig;

fn open_source(config: &DbConfig) -> Result<Box<dyn RelationalSource>> {
    let source: Box<dyn RelationalSource> = match config {
        DbConfig::Postgres(pg) => Box::new(PostgresSource::connect(pg)?),
        DbConfig::Sqlite(sqlite) => Box::new(SqliteSource::from_connection(sqlite.open()?)),
    };
    Ok(source)
}

/// Execute the `extract` command: one incremental extraction run.
pub fn execute(config: &PipelineConfig, time: Option<&str>, event: Option<&Path>) -> Result<()> {
    let store: Arc<dyn ObjectStore> = Arc::new(open_store(config)?);
    let watermarks = ObjectWatermarkStore::new(store.clone(), config.buckets.control.clone());
    let mut source = open_source(&config.source)
        .with_context(|| format!("Failed to open source {}", config.source.describe()))?;

    let mut settings = ExtractSettings::new(config.buckets.extraction.clone());
    if let Some(delay) = config.extract.phase_delay() {
        settings = settings.with_phase_delay(delay);
    }
    let mut extractor = Extractor::new(source.as_mut(), store.as_ref(), &watermarks, settings);

    let outcome = match (event, time) {
        (Some(path), _) => extractor.handle_event(&read_event(path)?),
        (None, Some(raw)) => extractor.run(parse_event_time(raw)?),
        (None, None) => extractor.run(Utc::now()),
    }
    .context("Extraction run failed")?;

    match outcome {
        RunOutcome::Completed {
            staged,
            empty,
            watermark,
        } => {
            println!("Extraction completed; watermark is now {watermark}.");
            for key in &staged {
                println!("  staged  {}/{key}", config.buckets.extraction);
            }
            for table in &empty {
                println!("  empty   {table}");
            }
        }
        RunOutcome::Halted { table, reason } => {
            println!("Extraction halted at '{table}'; watermark unchanged.");
            println!("  {reason}");
        }
    }
    Ok(())
}
