pub mod extract;
pub mod load;
pub mod tables;
pub mod transform;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tidewater_storage::LocalObjectStore;

use crate::config::PipelineConfig;

/// Which staged object a transform or load acts on.
#[derive(Debug, Args)]
pub struct ObjectArgs {
    /// Object-created notification JSON file
    #[arg(long, conflicts_with_all = ["bucket", "key"])]
    pub event: Option<PathBuf>,
    /// Bucket holding the object (default: the step's input bucket)
    #[arg(long)]
    pub bucket: Option<String>,
    /// Object key, e.g. `2024-02-15T19:01:53/address.pqt`
    #[arg(long, required_unless_present = "event")]
    pub key: Option<String>,
}

/// A resolved [`ObjectArgs`].
pub enum Invocation {
    Event(String),
    Object { bucket: String, key: String },
}

impl ObjectArgs {
    pub fn resolve(self, default_bucket: &str) -> Result<Invocation> {
        if let Some(path) = self.event {
            return read_event(&path).map(Invocation::Event);
        }
        let key = self.key.context("--key is required without --event")?;
        Ok(Invocation::Object {
            bucket: self.bucket.unwrap_or_else(|| default_bucket.to_string()),
            key,
        })
    }
}

pub fn read_event(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event file: {}", path.display()))
}

/// Filesystem object store with every configured bucket present.
pub fn open_store(config: &PipelineConfig) -> Result<LocalObjectStore> {
    let store = LocalObjectStore::new(config.storage.root.clone());
    for bucket in [
        &config.buckets.extraction,
        &config.buckets.control,
        &config.buckets.transformation,
    ] {
        store.ensure_bucket(bucket).with_context(|| {
            format!(
                "Failed to create bucket '{bucket}' under {}",
                config.storage.root.display()
            )
        })?;
    }
    Ok(store)
}
