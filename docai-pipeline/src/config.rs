//! Pipeline configuration.
//!
//! Values come from an optional `docai` config file layered under `DOCAI__*`
//! environment variables. See [`loader`] for the sources and
//! [`defaults`] for the fallback values.

mod defaults;
mod loader;

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

pub use loader::load_config;

use defaults::{
    default_accepted_mime_types, default_batch, default_local_root, default_location,
    default_max_files, default_poll_interval_secs, default_request_timeout_secs,
    default_storage, default_storage_endpoint, default_timeout_secs,
};

/// Environment variable consulted when no access token is configured
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Complete pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub processor: ProcessorConfig,

    #[serde(default = "default_batch")]
    pub batch: BatchConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,
}

/// Document AI processor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    pub project_id: String,

    #[serde(default = "default_location")]
    pub location: String,

    pub processor_id: String,

    /// Pin a specific processor version instead of the default one
    #[serde(default)]
    pub processor_version: Option<String>,

    /// Override for the regional API endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Batching limits and input filtering
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Hard ceiling on documents per batch request imposed by the service
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// How long to wait for each batch operation to finish
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_accepted_mime_types")]
    pub accepted_mime_types: BTreeSet<String>,
}

/// Which object store implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Gcs,
    Local,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory holding one subdirectory per bucket (local backend)
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub access_token: Option<String>,
}

impl ProcessorConfig {
    /// Fully qualified processor resource name
    pub fn resource_name(&self) -> String {
        let base = format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        );
        match &self.processor_version {
            Some(version) => format!("{}/processorVersions/{}", base, version),
            None => base,
        }
    }

    /// Regional API endpoint, honoring any override
    pub fn api_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-documentai.googleapis.com", self.location),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        self.accepted_mime_types.contains(content_type)
    }
}

/// Resolve an access token from config, falling back to the environment.
pub(crate) fn resolve_access_token(configured: &Option<String>) -> Option<String> {
    configured
        .clone()
        .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok())
        .filter(|token| !token.trim().is_empty())
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.processor.project_id.trim().is_empty() {
            return Err(config_error("processor.project_id must not be empty"));
        }
        if self.processor.processor_id.trim().is_empty() {
            return Err(config_error("processor.processor_id must not be empty"));
        }
        if self.processor.poll_interval_secs == 0 {
            return Err(config_error("processor.poll_interval_secs must be at least 1"));
        }
        if self.batch.max_files == 0 {
            return Err(config_error("batch.max_files must be at least 1"));
        }
        if self.batch.timeout_secs == 0 {
            return Err(config_error("batch.timeout_secs must be at least 1"));
        }
        if self.batch.accepted_mime_types.is_empty() {
            return Err(config_error("batch.accepted_mime_types must not be empty"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> PipelineError {
    PipelineError::Config {
        message: message.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> PipelineConfig {
    PipelineConfig {
        processor: ProcessorConfig {
            project_id: "test-project".to_string(),
            location: default_location(),
            processor_id: "abc123".to_string(),
            processor_version: None,
            endpoint: None,
            access_token: None,
            poll_interval_secs: 1,
            request_timeout_secs: default_request_timeout_secs(),
        },
        batch: default_batch(),
        storage: default_storage(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name() {
        let mut config = test_config();
        assert_eq!(
            config.processor.resource_name(),
            "projects/test-project/locations/us/processors/abc123"
        );

        config.processor.processor_version = Some("pretrained-invoice-v2.0".to_string());
        assert_eq!(
            config.processor.resource_name(),
            "projects/test-project/locations/us/processors/abc123/processorVersions/pretrained-invoice-v2.0"
        );
    }

    #[test]
    fn test_api_endpoint() {
        let mut config = test_config();
        config.processor.location = "eu".to_string();
        assert_eq!(
            config.processor.api_endpoint(),
            "https://eu-documentai.googleapis.com"
        );

        config.processor.endpoint = Some("http://localhost:9000/".to_string());
        assert_eq!(config.processor.api_endpoint(), "http://localhost:9000");
    }

    #[test]
    fn test_default_mime_types() {
        let config = test_config();
        assert!(config.batch.accepts("application/pdf"));
        assert!(config.batch.accepts("image/tiff"));
        assert!(!config.batch.accepts("text/plain"));
    }

    #[test]
    fn test_validate() {
        assert!(test_config().validate().is_ok());

        let mut config = test_config();
        config.batch.max_files = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config { .. })
        ));

        let mut config = test_config();
        config.batch.accepted_mime_types.clear();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.processor.project_id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configured_token_wins() {
        let token = resolve_access_token(&Some("configured".to_string()));
        assert_eq!(token.as_deref(), Some("configured"));
    }
}
