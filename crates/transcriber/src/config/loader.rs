use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks the schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }
    if config.worker_count == 0 {
        return Err(invalid("worker_count must be at least 1"));
    }
    if config.segmentation.max_segment_seconds == 0 {
        return Err(invalid("segmentation.max_segment_seconds must be positive"));
    }
    if config.segmentation.sample_rate == 0 {
        return Err(invalid("segmentation.sample_rate must be positive"));
    }
    if config.upload.max_bytes == 0 {
        return Err(invalid("upload.max_bytes must be positive"));
    }
    if config.upload.allowed_extensions.is_empty() {
        return Err(invalid("upload.allowed_extensions must not be empty"));
    }
    if let Some(ext) = config
        .upload
        .allowed_extensions
        .iter()
        .find(|e| !e.starts_with('.') || e.len() < 2)
    {
        return Err(invalid(format!(
            "Allowed extension '{}' must start with '.'",
            ext
        )));
    }
    if config.retry.max_attempts == 0 {
        return Err(invalid("retry.max_attempts must be at least 1"));
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        return Err(invalid(format!(
            "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
            config.retry.base_delay_ms, config.retry.max_delay_ms
        )));
    }
    if config.transcription.request_timeout_secs == 0 {
        return Err(invalid("transcription.request_timeout_secs must be positive"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
