//! Default values for configuration fields.

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::{BatchConfig, StorageBackend, StorageConfig};

pub(crate) fn default_location() -> String {
    "us".to_string()
}

pub(crate) fn default_poll_interval_secs() -> u64 {
    10
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_batch() -> BatchConfig {
    BatchConfig {
        max_files: default_max_files(),
        timeout_secs: default_timeout_secs(),
        accepted_mime_types: default_accepted_mime_types(),
    }
}

/// Batch requests are capped at 50 documents
pub(crate) fn default_max_files() -> usize {
    50
}

pub(crate) fn default_timeout_secs() -> u64 {
    400
}

pub(crate) fn default_accepted_mime_types() -> BTreeSet<String> {
    [
        mime::APPLICATION_PDF.essence_str(),
        mime::IMAGE_JPEG.essence_str(),
        mime::IMAGE_PNG.essence_str(),
        "image/tiff",
        mime::IMAGE_GIF.essence_str(),
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        backend: StorageBackend::default(),
        local_root: default_local_root(),
        endpoint: default_storage_endpoint(),
        access_token: None,
    }
}

pub(crate) fn default_local_root() -> PathBuf {
    PathBuf::from("./buckets")
}

pub(crate) fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}
