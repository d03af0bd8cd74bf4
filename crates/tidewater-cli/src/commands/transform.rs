use anyhow::{Context, Result};
use tidewater_transform::{TransformOutcome, Transformer};

use super::{open_store, Invocation, ObjectArgs};
use crate::config::PipelineConfig;

/// Execute the `transform` command: re-stage one object in warehouse shape.
pub fn execute(config: &PipelineConfig, args: ObjectArgs) -> Result<()> {
    let store = open_store(config)?;
    let transformer = Transformer::new(&store, config.buckets.transformation.clone());

    let outcome = match args.resolve(&config.buckets.extraction)? {
        Invocation::Event(body) => transformer.handle_event(&body),
        Invocation::Object { bucket, key } => transformer.handle(&bucket, &key),
    }
    .context("Transform failed")?;

    match outcome {
        TransformOutcome::Restaged { rows } => println!(
            "Transformed {rows} row(s) into bucket '{}'.",
            config.buckets.transformation
        ),
        TransformOutcome::Skipped => println!("No transform for this table; nothing written."),
    }
    Ok(())
}
