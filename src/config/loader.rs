//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration is empty")]
    Empty,
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML or JSON file.
///
/// Files ending in `.json` are parsed as JSON, everything else as TOML.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_json(&content)
    } else {
        parse_toml(&content)
    }
}

/// Parse and validate a TOML configuration document.
pub fn parse_toml(content: &str) -> Result<GuardConfig, ConfigError> {
    if content.trim().is_empty() {
        return Err(ConfigError::Empty);
    }
    let config: GuardConfig = toml::from_str(content)?;
    finish(config)
}

/// Parse and validate a JSON configuration document.
pub fn parse_json(content: &str) -> Result<GuardConfig, ConfigError> {
    if content.trim().is_empty() {
        return Err(ConfigError::Empty);
    }
    let config: GuardConfig = serde_json::from_str(content)?;
    finish(config)
}

fn finish(mut config: GuardConfig) -> Result<GuardConfig, ConfigError> {
    config.filters = config.filters.normalized();
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
