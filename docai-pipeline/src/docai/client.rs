//! Document AI REST client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{BatchProcessRequest, DocumentProcessor, OperationHandle};
use crate::config::{ProcessorConfig, resolve_access_token};
use crate::error::{PipelineError, PipelineResult, ProcessingError};

/// Document AI API client
#[derive(Clone)]
pub struct DocumentAiClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
    poll_interval: Duration,
}

/// `google.longrunning.Operation`
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationStatus>,
}

/// `google.rpc.Status`
#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl DocumentAiClient {
    pub fn new(config: &ProcessorConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("docai-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Config {
                message: format!("Failed to create Document AI HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.api_endpoint(),
            access_token: resolve_access_token(&config.access_token),
            poll_interval: config.poll_interval(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, ProcessingError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ProcessingError::Request {
                url: url.to_string(),
                source: e,
            })?;

        let response = check_status(response).await?;
        let body = response.bytes().await.map_err(|e| ProcessingError::Request {
            url: url.to_string(),
            source: e,
        })?;
        serde_json::from_slice(&body).map_err(ProcessingError::InvalidResponse)
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, ProcessingError> {
        let url = format!("{}/v1/{}", self.endpoint, name);
        self.execute(self.client.get(&url), &url).await
    }

    async fn poll_until_done(&self, handle: &OperationHandle) -> PipelineResult<()> {
        loop {
            let operation = self.get_operation(&handle.name).await?;
            if operation.done {
                if let Some(status) = operation.error {
                    return Err(ProcessingError::OperationFailed {
                        operation: operation.name,
                        code: status.code,
                        message: status.message,
                    }
                    .into());
                }
                return Ok(());
            }

            debug!(operation = %handle.name, "Operation still running");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ProcessingError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProcessingError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response)
}

#[async_trait]
impl DocumentProcessor for DocumentAiClient {
    async fn submit_batch(
        &self,
        resource_name: &str,
        request: &BatchProcessRequest,
    ) -> PipelineResult<OperationHandle> {
        let url = format!("{}/v1/{}:batchProcess", self.endpoint, resource_name);
        let operation: Operation = self
            .execute(self.client.post(&url).json(request), &url)
            .await?;
        Ok(OperationHandle::new(operation.name))
    }

    async fn wait(&self, handle: &OperationHandle, timeout: Duration) -> PipelineResult<()> {
        match tokio::time::timeout(timeout, self.poll_until_done(handle)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                operation: handle.name.clone(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_operation_parsing() {
        let body = r#"{
            "name": "projects/1/locations/us/operations/42",
            "metadata": {"@type": "type.googleapis.com/google.cloud.documentai.v1.BatchProcessMetadata", "state": "RUNNING"}
        }"#;
        let operation: Operation = serde_json::from_str(body).unwrap();
        assert_eq!(operation.name, "projects/1/locations/us/operations/42");
        assert!(!operation.done);
        assert!(operation.error.is_none());
    }

    #[test]
    fn test_failed_operation_parsing() {
        let body = r#"{
            "name": "projects/1/locations/us/operations/42",
            "done": true,
            "error": {"code": 3, "message": "Invalid document"}
        }"#;
        let operation: Operation = serde_json::from_str(body).unwrap();
        assert!(operation.done);
        let status = operation.error.unwrap();
        assert_eq!(status.code, 3);
        assert_eq!(status.message, "Invalid document");
    }

    #[test]
    fn test_client_uses_regional_endpoint() {
        let config = crate::config::test_config();
        let client = DocumentAiClient::new(&config.processor).unwrap();
        assert_eq!(client.endpoint, "https://us-documentai.googleapis.com");
        assert_eq!(client.poll_interval, Duration::from_secs(1));
    }
}
