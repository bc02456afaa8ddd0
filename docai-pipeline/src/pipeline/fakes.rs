//! In-process stand-in for Document AI used by pipeline tests.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::docai::{BatchProcessRequest, DocumentProcessor, OperationHandle};
use crate::error::{PipelineError, PipelineResult, ProcessingError};
use crate::storage::GcsUri;

/// Records requests and answers them according to a script.
///
/// Operation ids count up from 1. When `output_root` is set, every submitted
/// document gets a result record written into the local bucket tree under
/// `{output prefix}/{operation id}/0/`, like the real service does.
#[derive(Default)]
pub(crate) struct ScriptedProcessor {
    /// Operation number whose wait times out
    time_out_operation: Option<usize>,
    /// Submission number that the service rejects
    reject_submission: Option<usize>,
    output_root: Option<PathBuf>,
    submitted: AtomicUsize,
    requests: Mutex<Vec<(String, BatchProcessRequest)>>,
    waited: Mutex<Vec<String>>,
}

impl ScriptedProcessor {
    /// Waiting on operation `number` times out
    pub fn timing_out(number: usize) -> Self {
        Self {
            time_out_operation: Some(number),
            ..Default::default()
        }
    }

    /// Submission `number` is rejected by the service
    pub fn rejecting(number: usize) -> Self {
        Self {
            reject_submission: Some(number),
            ..Default::default()
        }
    }

    /// Result records are written under `root`, one directory per bucket
    pub fn writing_to(root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: Some(root.into()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<(String, BatchProcessRequest)> {
        self.requests.lock().unwrap().clone()
    }

    /// Ids of operations that were waited on
    pub fn waited(&self) -> Vec<String> {
        self.waited.lock().unwrap().clone()
    }

    fn write_results(&self, operation_id: &str, request: &BatchProcessRequest) {
        let Some(root) = &self.output_root else { return };
        let output =
            GcsUri::parse(&request.document_output_config.gcs_output_config.gcs_uri).unwrap();

        for document in &request.input_documents.gcs_documents.documents {
            let name = document.gcs_uri.rsplit('/').next().unwrap();
            let stem = name.split('.').next().unwrap();
            let path = root
                .join(&output.bucket)
                .join(format!("{}{}/0/{}-0.json", output.prefix, operation_id, stem));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();

            let record = serde_json::json!({
                "uri": document.gcs_uri,
                "text": "full OCR text",
                "pages": [{"pageNumber": 1}],
                "entities": [
                    {"type": "source/file", "mentionText": name}
                ]
            });
            std::fs::write(path, record.to_string()).unwrap();
        }
    }
}

#[async_trait]
impl DocumentProcessor for ScriptedProcessor {
    async fn submit_batch(
        &self,
        resource_name: &str,
        request: &BatchProcessRequest,
    ) -> PipelineResult<OperationHandle> {
        let number = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .unwrap()
            .push((resource_name.to_string(), request.clone()));

        if self.reject_submission == Some(number) {
            return Err(ProcessingError::Api {
                status: 400,
                message: "Invalid batch".to_string(),
            }
            .into());
        }

        let operation_id = number.to_string();
        self.write_results(&operation_id, request);
        Ok(OperationHandle::new(format!(
            "projects/p/locations/us/operations/{}",
            operation_id
        )))
    }

    async fn wait(&self, handle: &OperationHandle, timeout: Duration) -> PipelineResult<()> {
        self.waited.lock().unwrap().push(handle.id().to_string());

        let number: usize = handle.id().parse().unwrap();
        if self.time_out_operation == Some(number) {
            return Err(PipelineError::Timeout {
                operation: handle.name.clone(),
                timeout_secs: timeout.as_secs(),
            });
        }
        Ok(())
    }
}
