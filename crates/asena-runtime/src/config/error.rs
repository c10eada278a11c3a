//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

use asena_framework::PatternError;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The merged sources could not be extracted into the schema.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    ValidationError { message: String },

    /// Invalid bridge URL.
    #[error("invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The handler prefix does not compile.
    #[error("invalid handler prefix: {0}")]
    InvalidHandlers(#[from] PatternError),
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
