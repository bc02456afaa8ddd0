//! Batch processing workflow.
//!
//! This module coordinates the lifecycle of a processing run:
//! - Partitioning an input listing into batches
//! - Submitting batches and waiting for each operation
//! - Harvesting output records
//! - Flattening entities
//! - Archiving inputs and cleaning up output

mod cleanup;
#[cfg(test)]
mod fakes;
mod flatten;
mod harvest;
mod partition;
mod submit;

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::docai::{DocumentProcessor, OperationHandle, ParsedDocument};
use crate::error::PipelineResult;
use crate::storage::{GcsUri, ObjectStore};

pub use cleanup::{CleanupReport, CleanupTargets};
pub use flatten::{EntityRecord, flatten_entities};
pub use partition::Batch;
pub use submit::{BatchJob, operation_output_prefix};

/// Runs batches through Document AI against injected storage and processor clients
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    processor: Arc<dyn DocumentProcessor>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        processor: Arc<dyn DocumentProcessor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            processor,
            config,
        }
    }

    /// List `input_bucket/input_prefix` and group accepted objects into batches.
    ///
    /// The batch size defaults to the configured ceiling and is validated
    /// before storage is touched.
    pub async fn create_batches(
        &self,
        input_bucket: &str,
        input_prefix: &str,
        batch_size: Option<usize>,
    ) -> PipelineResult<Vec<Batch>> {
        let ceiling = self.config.batch.max_files;
        let batch_size = batch_size.unwrap_or(ceiling);
        partition::validate_batch_size(batch_size, ceiling)?;

        let objects = self.store.list_objects(input_bucket, input_prefix).await?;
        Ok(partition::partition_objects(
            objects,
            batch_size,
            &self.config.batch,
        ))
    }

    /// Partition the input and run every batch to completion, in order.
    pub async fn run_batch_processing(
        &self,
        output_uri: &str,
        input_bucket: &str,
        input_prefix: &str,
        batch_size: Option<usize>,
    ) -> PipelineResult<Vec<BatchJob>> {
        let output_root = GcsUri::parse(output_uri)?;
        let batches = self
            .create_batches(input_bucket, input_prefix, batch_size)
            .await?;
        info!(
            batches = batches.len(),
            output = %output_root,
            "Submitting document batches"
        );

        submit::submit_batches(
            self.processor.as_ref(),
            &self.config.processor.resource_name(),
            batches,
            &output_root,
            self.config.batch.timeout(),
        )
        .await
    }

    /// Parse every output record under `output_bucket/output_directory`
    pub async fn harvest_documents(
        &self,
        output_bucket: &str,
        output_directory: &str,
    ) -> PipelineResult<Vec<ParsedDocument>> {
        let harvest = harvest::harvest(self.store.as_ref(), output_bucket, output_directory).await?;
        for skipped in &harvest.skipped {
            debug!(key = %skipped.key, reason = %skipped.reason, "Dropped from harvest");
        }
        info!(
            bucket = %output_bucket,
            prefix = %output_directory,
            documents = harvest.documents.len(),
            skipped = harvest.skipped.len(),
            "Harvested output records"
        );
        Ok(harvest.documents)
    }

    /// Harvest only the records written by one operation
    pub async fn harvest_operation(
        &self,
        output_root: &GcsUri,
        operation: &OperationHandle,
    ) -> PipelineResult<Vec<ParsedDocument>> {
        let prefix = operation_output_prefix(output_root, operation);
        self.harvest_documents(&prefix.bucket, &prefix.prefix).await
    }

    pub fn flatten_entities(&self, document: &ParsedDocument) -> EntityRecord {
        flatten_entities(document)
    }

    /// Archive the inputs and delete them along with the intermediate output
    pub async fn cleanup(&self, targets: CleanupTargets<'_>) -> PipelineResult<CleanupReport> {
        cleanup::cleanup(self.store.as_ref(), targets).await
    }
}
