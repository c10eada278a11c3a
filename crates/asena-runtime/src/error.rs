//! Runtime error types.

use thiserror::Error;

use asena_core::{StoreError, TransportError};
use asena_framework::PatternError;

use crate::config::ConfigError;

/// Errors that stop the runtime from starting or running.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A command trigger failed to compile while building the registry.
    #[error("command registration failed: {0}")]
    Pattern(#[from] PatternError),

    /// A store needed at startup is unusable.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The transport failed in a way the supervisor does not retry.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The builder was missing a required part.
    #[error("runtime is missing {0}")]
    Missing(&'static str),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
