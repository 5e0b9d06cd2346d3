//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>h, <number>m, <number>s or a combination (e.g., 30s, 5m, 1h30m)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when a settings value cannot be parsed
#[derive(Debug, Clone, Error)]
#[error("Invalid {key}: \"{input}\". Valid values are: {expected}")]
pub struct SettingsParseError {
    pub key: String,
    pub input: String,
    pub expected: String,
}

impl SettingsParseError {
    pub fn new(key: &str, input: &str, expected: &str) -> Self {
        Self {
            key: key.to_string(),
            input: input.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

impl From<SettingsParseError> for ConfigError {
    fn from(err: SettingsParseError) -> Self {
        Self::ValidationError {
            message: err.to_string(),
            key: err.key,
        }
    }
}
