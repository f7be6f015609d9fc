//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::PipelineConfig;
use std::path::Path;

/// Loads and validates a `kiln.toml` configuration from a project directory.
///
/// Reads `<project_dir>/kiln.toml`, parses it, and validates required
/// fields.
pub fn load_config(project_dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let config_path = project_dir.join("kiln.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.pipeline.tool_version.is_empty() {
        return Err(ConfigError::MissingField(
            "pipeline.tool_version".to_string(),
        ));
    }
    if config.store.root.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("store.root".to_string()));
    }
    if config.store.config.is_empty() {
        return Err(ConfigError::ValidationError(
            "store.config must not be empty".to_string(),
        ));
    }
    Ok(())
}
