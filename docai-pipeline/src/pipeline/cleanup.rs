//! Archiving processed inputs and removing intermediate output.
//!
//! Cleanup is a best-effort two-phase move. Every input object is first copied
//! to the archive bucket under the same key, and only inputs whose copy
//! succeeded are queued for deletion together with the intermediate output.
//! Per-object failures are recorded and the run continues. Re-running is
//! safe: copies overwrite, and deleting an object that is already gone counts
//! as done.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::storage::{ObjectRef, ObjectStore};

/// Stage at which an object could not be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupStage {
    Archive,
    Delete,
}

/// A per-object failure that did not stop the cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub bucket: String,
    pub key: String,
    pub stage: CleanupStage,
    pub error: String,
}

/// Outcome of one cleanup run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub archived: usize,
    pub deleted: usize,
    /// Queued objects that were already gone when deleted
    pub already_absent: usize,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, object: &ObjectRef, stage: CleanupStage, error: String) {
        metrics::counter!("docai_cleanup_failures_total").increment(1);
        self.failures.push(CleanupFailure {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            stage,
            error,
        });
    }
}

/// Locations involved in one cleanup run
#[derive(Debug, Clone, Copy)]
pub struct CleanupTargets<'a> {
    pub input_bucket: &'a str,
    pub input_prefix: &'a str,
    pub output_bucket: &'a str,
    pub output_directory: &'a str,
    pub archive_bucket: &'a str,
}

pub async fn cleanup(store: &dyn ObjectStore, targets: CleanupTargets<'_>) -> PipelineResult<CleanupReport> {
    if targets.archive_bucket == targets.input_bucket {
        // The archive copy would be the object itself and then get deleted
        return Err(PipelineError::Config {
            message: format!(
                "Archive bucket must differ from input bucket ({})",
                targets.input_bucket
            ),
        });
    }

    let intermediate = store
        .list_objects(targets.output_bucket, targets.output_directory)
        .await?;
    let inputs = store
        .list_objects(targets.input_bucket, targets.input_prefix)
        .await?;
    info!(
        intermediate = intermediate.len(),
        inputs = inputs.len(),
        "Starting cleanup"
    );

    let mut report = CleanupReport::default();
    let mut delete_queue = intermediate;
    let mut keep = HashSet::new();

    for object in inputs {
        info!(
            bucket = %object.bucket,
            key = %object.key,
            archive_bucket = %targets.archive_bucket,
            "Archiving input object"
        );
        match store
            .copy_object(&object.bucket, &object.key, targets.archive_bucket)
            .await
        {
            Ok(()) => {
                report.archived += 1;
                metrics::counter!("docai_objects_archived_total").increment(1);
                delete_queue.push(object);
            }
            Err(e) => {
                warn!(
                    bucket = %object.bucket,
                    key = %object.key,
                    error = %e,
                    "Failed to archive input object, leaving it in place"
                );
                report.record_failure(&object, CleanupStage::Archive, e.to_string());
                keep.insert((object.bucket, object.key));
            }
        }
    }

    // Overlapping input and output locations list the same object twice, and
    // an input whose copy failed may also sit in the intermediate listing
    let mut seen = HashSet::new();
    delete_queue.retain(|object| {
        let id = (object.bucket.clone(), object.key.clone());
        !keep.contains(&id) && seen.insert(id)
    });

    for object in delete_queue {
        debug!(bucket = %object.bucket, key = %object.key, "Deleting object");
        match store.delete_object(&object.bucket, &object.key).await {
            Ok(()) => {
                report.deleted += 1;
                metrics::counter!("docai_objects_deleted_total").increment(1);
            }
            Err(e) if e.is_not_found() => {
                debug!(bucket = %object.bucket, key = %object.key, "Object already deleted");
                report.already_absent += 1;
            }
            Err(e) => {
                warn!(
                    bucket = %object.bucket,
                    key = %object.key,
                    error = %e,
                    "Failed to delete object"
                );
                report.record_failure(&object, CleanupStage::Delete, e.to_string());
            }
        }
    }

    info!(
        archived = report.archived,
        deleted = report.deleted,
        already_absent = report.already_absent,
        failures = report.failures.len(),
        "Cleanup finished"
    );
    Ok(report)
}
