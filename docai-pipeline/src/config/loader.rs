//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};

use crate::error::{PipelineError, PipelineResult};

use super::PipelineConfig;

/// Load configuration from `docai.{toml,yaml,json}` (optional) and `DOCAI__*` env vars
pub fn load_config() -> PipelineResult<PipelineConfig> {
    let config: PipelineConfig = Config::builder()
        .add_source(File::with_name("docai").required(false))
        .add_source(
            Environment::with_prefix("DOCAI")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("batch.accepted_mime_types")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| PipelineError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| PipelineError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })?;

    config.validate()?;
    Ok(config)
}
