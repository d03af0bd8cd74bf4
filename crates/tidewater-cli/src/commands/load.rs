use anyhow::{Context, Result};
use tidewater_dest::{Dispatch, Loader, PostgresTarget, RelationalTarget, SqliteTarget};
use tidewater_sql::DbConfig;

use super::{open_store, Invocation, ObjectArgs};
use crate::config::PipelineConfig;

fn open_target(config: &DbConfig) -> Result<Box<dyn RelationalTarget>> {
    let target: Box<dyn RelationalTarget> = match config {
        DbConfig::Postgres(pg) => Box::new(PostgresTarget::connect(pg)?),
        DbConfig::Sqlite(sqlite) => Box::new(SqliteTarget::from_connection(sqlite.open()?)),
    };
    Ok(target)
}

/// Execute the `load` command: upsert one transformed object.
///
/// Terminal failures are logged and reported but exit cleanly; only
/// retryable failures make the command fail.
pub fn execute(config: &PipelineConfig, args: ObjectArgs) -> Result<()> {
    let store = open_store(config)?;
    let invocation = args.resolve(&config.buckets.transformation)?;
    let mut target = open_target(&config.target)
        .with_context(|| format!("Failed to open target {}", config.target.describe()))?;
    let mut loader = Loader::new(&store, target.as_mut(), config.load.commit_mode);

    let dispatch = match invocation {
        Invocation::Event(body) => loader.dispatch_event(&body),
        Invocation::Object { bucket, key } => loader.dispatch(&bucket, &key),
    }
    .context("Load failed; the object should be redelivered")?;

    match dispatch {
        Dispatch::Loaded(report) => {
            println!("Loaded {} row(s) into {}.", report.rows, report.target_table);
        }
        Dispatch::Rejected { category, reason } => {
            println!("Rejected ({category}): {reason}");
        }
    }
    Ok(())
}
