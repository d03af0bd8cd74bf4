//! Fetch, transform and re-stage one staged object.

use std::time::Instant;

use tidewater_storage::{decode_single, encode_batch, ObjectStore};
use tidewater_types::event::ObjectNotification;
use tidewater_types::{SourceTable, StagedKey};

use crate::error::{Result, TransformError};
use crate::mapping::TableTransform;
use crate::ops::apply_ops;

/// How a transform invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// The transformed object was written under the same key.
    Restaged { rows: usize },
    /// The table has no transform; nothing was written.
    Skipped,
}

/// Re-stages objects from the extraction bucket into `output_bucket`.
pub struct Transformer<'a> {
    objects: &'a dyn ObjectStore,
    output_bucket: String,
}

impl<'a> Transformer<'a> {
    pub fn new(objects: &'a dyn ObjectStore, output_bucket: impl Into<String>) -> Self {
        Self {
            objects,
            output_bucket: output_bucket.into(),
        }
    }

    /// Transform `bucket/key` and write the result under the same key in
    /// the output bucket.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] for malformed keys, unknown tables,
    /// storage failures and column operations that cannot be applied.
    pub fn handle(&self, bucket: &str, key: &str) -> Result<TransformOutcome> {
        let started = Instant::now();
        let staged = StagedKey::parse(key)?;
        let table = staged
            .table()
            .parse::<SourceTable>()
            .map_err(|_| TransformError::UnknownTable {
                table: staged.table().to_string(),
            })?;

        let TableTransform::Mapped(ops) = TableTransform::for_table(table) else {
            tracing::info!(table = %table, key, "No transform for table; skipping");
            return Ok(TransformOutcome::Skipped);
        };

        let batch = decode_single(self.objects.get(bucket, key)?)?;
        let out = apply_ops(&batch, ops)?;
        self.objects
            .put(&self.output_bucket, key, encode_batch(&out)?)?;

        tracing::info!(
            table = %table,
            rows = out.num_rows(),
            columns = out.num_columns(),
            bucket = %self.output_bucket,
            key,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Re-staged transformed object"
        );
        Ok(TransformOutcome::Restaged {
            rows: out.num_rows(),
        })
    }

    /// Decode an object-created notification and transform the object.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Event`] for a malformed notification,
    /// otherwise as [`handle`](Self::handle).
    pub fn handle_event(&self, body: &str) -> Result<TransformOutcome> {
        let object = ObjectNotification::from_json(body)?.object()?;
        let result = self.handle(&object.bucket, &object.key);
        if let Err(TransformError::Storage(e)) = &result {
            tracing::error!(
                bucket = %e.bucket,
                key = %object.key,
                code = %e.code,
                message = %e.message,
                "Storage access failed"
            );
        }
        result
    }
}
