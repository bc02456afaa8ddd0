//! Splitting a storage listing into batch requests.

use tracing::{debug, warn};

use crate::config::BatchConfig;
use crate::docai::GcsDocument;
use crate::error::{PipelineError, PipelineResult};
use crate::storage::ObjectRef;

/// Documents submitted together in one batch request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub documents: Vec<GcsDocument>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Reject batch sizes the service would refuse. Sizes are never clamped.
pub fn validate_batch_size(batch_size: usize, ceiling: usize) -> PipelineResult<()> {
    if batch_size == 0 || batch_size > ceiling {
        return Err(PipelineError::InvalidConfiguration {
            batch_size,
            ceiling,
        });
    }
    Ok(())
}

/// Group accepted objects into batches of `batch_size`, in listing order.
///
/// A batch is closed only when another accepted object arrives and the current
/// batch is already full. The final batch is always returned, so an empty (or
/// fully filtered) listing yields a single empty batch.
pub fn partition_objects(
    objects: impl IntoIterator<Item = ObjectRef>,
    batch_size: usize,
    config: &BatchConfig,
) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut batch = Batch::default();

    for object in objects {
        let content_type = object.content_type.as_deref().unwrap_or_default();
        if !config.accepts(content_type) {
            warn!(
                bucket = %object.bucket,
                key = %object.key,
                content_type = %content_type,
                "Unsupported content type, skipping object"
            );
            metrics::counter!("docai_objects_skipped_total").increment(1);
            continue;
        }

        if batch.len() == batch_size {
            batches.push(std::mem::take(&mut batch));
        }

        debug!(key = %object.key, size = ?object.size, "Accepted object");
        batch.documents.push(GcsDocument {
            gcs_uri: object.gcs_uri(),
            mime_type: content_type.to_string(),
        });
    }

    batches.push(batch);
    batches
}
