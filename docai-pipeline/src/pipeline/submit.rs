//! Submitting batches to Document AI, one operation at a time.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

use super::partition::Batch;
use crate::docai::{BatchProcessRequest, DocumentProcessor, OperationHandle};
use crate::error::{PipelineError, PipelineResult};
use crate::storage::GcsUri;

/// A batch operation that ran to completion
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub operation: OperationHandle,
    pub batch_index: usize,
    pub document_count: usize,
    /// Output root shared by every job of a run
    pub output_root: GcsUri,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BatchJob {
    /// Subdirectory the service writes this job's results to
    pub fn output_prefix(&self) -> GcsUri {
        operation_output_prefix(&self.output_root, &self.operation)
    }
}

/// Results of an operation land under `{output root}/{operation id}/`
pub fn operation_output_prefix(output_root: &GcsUri, operation: &OperationHandle) -> GcsUri {
    output_root.join(operation.id())
}

/// Submit each batch and wait for it before moving on.
///
/// Returns completed jobs in submission order. The first batch that fails to
/// submit or to finish within `timeout` aborts the run; batches after it are
/// never submitted. Empty batches are skipped.
pub async fn submit_batches(
    processor: &dyn DocumentProcessor,
    resource_name: &str,
    batches: Vec<Batch>,
    output_root: &GcsUri,
    timeout: Duration,
) -> PipelineResult<Vec<BatchJob>> {
    let mut jobs = Vec::with_capacity(batches.len());
    let output_uri = output_root.to_string();

    for (batch_index, batch) in batches.into_iter().enumerate() {
        if batch.is_empty() {
            warn!(batch = batch_index, "Batch has no documents, not submitting");
            continue;
        }

        let document_count = batch.len();
        info!(
            batch = batch_index,
            documents = document_count,
            "Processing document batch"
        );

        let request = BatchProcessRequest::new(batch.documents, &output_uri);
        let submitted_at = Utc::now();
        let operation = processor
            .submit_batch(resource_name, &request)
            .await
            .map_err(|e| PipelineError::Submission {
                batch_index,
                operation: None,
                source: Box::new(e),
            })?;
        metrics::counter!("docai_batches_submitted_total").increment(1);

        info!(batch = batch_index, operation = %operation.name, "Waiting for operation");
        processor
            .wait(&operation, timeout)
            .await
            .map_err(|e| PipelineError::Submission {
                batch_index,
                operation: Some(operation.name.clone()),
                source: Box::new(e),
            })?;

        let completed_at = Utc::now();
        info!(
            batch = batch_index,
            operation = %operation.name,
            elapsed_secs = (completed_at - submitted_at).num_seconds(),
            "Operation completed"
        );

        jobs.push(BatchJob {
            operation,
            batch_index,
            document_count,
            output_root: output_root.clone(),
            submitted_at,
            completed_at,
        });
    }

    if jobs.is_empty() {
        warn!(output = %output_uri, "No documents were submitted, nothing to process");
    }
    Ok(jobs)
}
