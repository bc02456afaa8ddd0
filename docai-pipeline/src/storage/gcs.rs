//! Cloud Storage JSON API client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{ObjectRef, ObjectStore};
use crate::config::{StorageConfig, resolve_access_token};
use crate::error::{PipelineError, PipelineResult, StorageError};

/// Cloud Storage client
#[derive(Clone)]
pub struct GcsStorage {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    bucket: String,
    content_type: Option<String>,
    /// The API encodes uint64 as a string
    size: Option<String>,
}

impl From<ObjectResource> for ObjectRef {
    fn from(resource: ObjectResource) -> Self {
        ObjectRef {
            bucket: resource.bucket,
            key: resource.name,
            content_type: resource.content_type,
            size: resource.size.and_then(|s| s.parse().ok()),
        }
    }
}

impl GcsStorage {
    pub fn new(config: &StorageConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("docai-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Config {
                message: format!("Failed to create storage HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: resolve_access_token(&config.access_token),
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            urlencoding::encode(bucket),
            urlencoding::encode(key)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, StorageError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                url: url.to_string(),
                source: e,
            })
    }
}

/// Map a non-success response to a storage error
async fn check_status(response: Response, bucket: &str, key: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
    }
    if !status.is_success() {
        return Err(StorageError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response)
}

#[async_trait]
impl ObjectStore for GcsStorage {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>, StorageError> {
        let url = format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint,
            urlencoding::encode(bucket)
        );

        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self.send(self.client.get(&url).query(&query), &url).await?;
            let response = check_status(response, bucket, prefix).await?;
            let body = response.bytes().await.map_err(|e| StorageError::Request {
                url: url.clone(),
                source: e,
            })?;
            let page: ListResponse =
                serde_json::from_slice(&body).map_err(StorageError::InvalidResponse)?;

            objects.extend(page.items.into_iter().map(ObjectRef::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(bucket = %bucket, prefix = %prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let url = self.object_url(bucket, key);
        let response = self
            .send(self.client.get(&url).query(&[("alt", "media")]), &url)
            .await?;
        let response = check_status(response, bucket, key).await?;
        response.bytes().await.map_err(|e| StorageError::Request { url, source: e })
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        key: &str,
        dst_bucket: &str,
    ) -> Result<(), StorageError> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(src_bucket, key),
            urlencoding::encode(dst_bucket),
            urlencoding::encode(key)
        );
        let response = self.send(self.client.post(&url), &url).await?;
        check_status(response, src_bucket, key).await?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let url = self.object_url(bucket, key);
        let response = self.send(self.client.delete(&url), &url).await?;
        check_status(response, bucket, key).await?;
        Ok(())
    }
}
