//! Object storage access.
//!
//! The pipeline only needs four operations from a bucket store: list under a
//! prefix, read, copy between buckets and delete. [`ObjectStore`] captures
//! those so the pipeline can run against Cloud Storage ([`GcsStorage`]) or a
//! directory tree on disk ([`LocalStorage`]).

mod gcs;
mod local;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{PipelineError, PipelineResult, StorageError};

pub use gcs::GcsStorage;
pub use local::LocalStorage;

#[cfg(test)]
pub(crate) use local::tests::put;

const GCS_SCHEME: &str = "gs://";

/// A stored object as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

impl ObjectRef {
    pub fn gcs_uri(&self) -> String {
        format!("{}{}/{}", GCS_SCHEME, self.bucket, self.key)
    }
}

/// A `gs://bucket/prefix` location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsUri {
    pub bucket: String,
    pub prefix: String,
}

impl GcsUri {
    /// Parse a `gs://` URI. The prefix keeps a trailing `/` when non-empty.
    pub fn parse(uri: &str) -> PipelineResult<Self> {
        let invalid = || PipelineError::InvalidUri {
            uri: uri.to_string(),
        };

        let rest = uri.strip_prefix(GCS_SCHEME).ok_or_else(invalid)?;
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(invalid());
        }

        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        Ok(Self {
            bucket: bucket.to_string(),
            prefix,
        })
    }

    /// Extend the prefix with one more path segment
    pub fn join(&self, segment: &str) -> Self {
        Self {
            bucket: self.bucket.clone(),
            prefix: format!("{}{}/", self.prefix, segment.trim_matches('/')),
        }
    }
}

impl std::fmt::Display for GcsUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}/{}", GCS_SCHEME, self.bucket, self.prefix)
    }
}

/// Bucket/key object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object whose key starts with `prefix`, in listing order
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>, StorageError>;

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Copy `src_bucket/key` to `dst_bucket/key`, overwriting any existing copy
    async fn copy_object(&self, src_bucket: &str, key: &str, dst_bucket: &str)
    -> Result<(), StorageError>;

    /// Delete an object. Missing objects yield [`StorageError::NotFound`].
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}

/// Build the configured object store
pub fn from_config(config: &StorageConfig) -> PipelineResult<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Gcs => Arc::new(GcsStorage::new(config)?),
        StorageBackend::Local => Arc::new(LocalStorage::new(config.local_root.clone())),
    };
    Ok(store)
}
