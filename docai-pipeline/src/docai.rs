//! Document AI batch processing.
//!
//! This module provides the request types for `batchProcess`, the parsed
//! output schema, and the [`DocumentProcessor`] seam the pipeline submits
//! through. [`DocumentAiClient`] is the REST implementation.

mod client;
pub mod document;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::PipelineResult;

pub use client::DocumentAiClient;
pub use document::{Entity, ParsedDocument};

/// One input document for a batch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsDocument {
    pub gcs_uri: String,
    pub mime_type: String,
}

/// Body of a `batchProcess` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessRequest {
    pub input_documents: BatchDocumentsInputConfig,
    pub document_output_config: DocumentOutputConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDocumentsInputConfig {
    pub gcs_documents: GcsDocuments,
}

#[derive(Debug, Clone, Serialize)]
pub struct GcsDocuments {
    pub documents: Vec<GcsDocument>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutputConfig {
    pub gcs_output_config: GcsOutputConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsOutputConfig {
    pub gcs_uri: String,
}

impl BatchProcessRequest {
    pub fn new(documents: Vec<GcsDocument>, output_uri: &str) -> Self {
        Self {
            input_documents: BatchDocumentsInputConfig {
                gcs_documents: GcsDocuments { documents },
            },
            document_output_config: DocumentOutputConfig {
                gcs_output_config: GcsOutputConfig {
                    gcs_uri: output_uri.to_string(),
                },
            },
        }
    }
}

/// Handle to a submitted long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    /// `projects/{project}/locations/{location}/operations/{id}`
    pub name: String,
}

impl OperationHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Trailing operation id, which names the job's output subdirectory
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Submits batch jobs and waits for them to finish
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    /// Start a batch job for `resource_name` (a processor or processor version)
    async fn submit_batch(
        &self,
        resource_name: &str,
        request: &BatchProcessRequest,
    ) -> PipelineResult<OperationHandle>;

    /// Block until the operation reaches a terminal state or `timeout` elapses
    async fn wait(&self, handle: &OperationHandle, timeout: Duration) -> PipelineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = BatchProcessRequest::new(
            vec![GcsDocument {
                gcs_uri: "gs://in/a.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
            }],
            "gs://out/results/",
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "inputDocuments": {
                    "gcsDocuments": {
                        "documents": [
                            {"gcsUri": "gs://in/a.pdf", "mimeType": "application/pdf"}
                        ]
                    }
                },
                "documentOutputConfig": {
                    "gcsOutputConfig": {"gcsUri": "gs://out/results/"}
                }
            })
        );
    }

    #[test]
    fn test_operation_id() {
        let handle = OperationHandle::new("projects/123/locations/us/operations/9876543210");
        assert_eq!(handle.id(), "9876543210");
        assert_eq!(OperationHandle::new("bare").id(), "bare");
    }
}
