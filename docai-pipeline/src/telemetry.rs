//! Process-wide metrics recorder.
//!
//! Counters are kept in memory by a Prometheus recorder. A one-shot run has no
//! scrape window, so the snapshot is written to a file for a node_exporter
//! textfile collector instead of being served over HTTP.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

pub fn install_recorder() -> PipelineResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| PipelineError::Config {
            message: format!("Failed to install metrics recorder: {}", e),
        })
}

/// Write the current counters to `path` in Prometheus text format.
///
/// The snapshot goes to `<path>.tmp` first and is renamed into place, so a
/// collector never reads a half-written file.
pub async fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> PipelineResult<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = Path::new(&staging);

    let output_error = |path: &Path, source| PipelineError::Output {
        path: path.display().to_string(),
        source,
    };
    tokio::fs::write(staging, handle.render())
        .await
        .map_err(|e| output_error(staging, e))?;
    tokio::fs::rename(staging, path)
        .await
        .map_err(|e| output_error(path, e))?;

    info!(path = %path.display(), "Wrote metrics snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_contains_counters() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("docai_batches_submitted_total").increment(2);
            metrics::counter!("docai_objects_deleted_total").increment(5);
        });

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docai.prom");
        write_snapshot(&handle, &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("docai_batches_submitted_total 2"));
        assert!(text.contains("docai_objects_deleted_total 5"));
        assert!(!dir.path().join("docai.prom.tmp").exists());
    }

    #[tokio::test]
    async fn test_snapshot_into_missing_directory_fails() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("docai.prom");

        let err = write_snapshot(&recorder.handle(), &path).await.unwrap_err();
        assert!(matches!(err, PipelineError::Output { .. }));
    }
}
