mod commands;
mod config;
mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::commands::ObjectArgs;
use crate::config::{parser, PipelineConfig};

#[derive(Parser)]
#[command(
    name = "tidewater",
    version,
    about = "Incremental extract, transform and upsert load"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Pipeline YAML file; without it, configuration comes from the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage rows changed since the last successful run
    Extract {
        /// Trigger time (RFC 3339, or naive ISO-8601 read as UTC); defaults to now
        #[arg(long, conflicts_with = "event")]
        time: Option<String>,
        /// Trigger event JSON file (`{"time": ...}`)
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Re-stage one extracted object in warehouse shape
    Transform(ObjectArgs),
    /// Upsert one transformed object into the warehouse
    Load(ObjectArgs),
    /// List known tables, their relations and transforms
    Tables,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => parser::parse_config(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => PipelineConfig::from_env().context("Failed to load config from environment")?,
    };
    tracing::debug!(
        source = %config.source.describe(),
        target = %config.target.describe(),
        storage_root = %config.storage.root.display(),
        "Configuration loaded"
    );
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level)?;

    match cli.command {
        Commands::Extract { time, event } => {
            let config = load_config(cli.config.as_deref())?;
            commands::extract::execute(&config, time.as_deref(), event.as_deref())
        }
        Commands::Transform(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::transform::execute(&config, args)
        }
        Commands::Load(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::load::execute(&config, args)
        }
        Commands::Tables => {
            commands::tables::execute();
            Ok(())
        }
    }
}
