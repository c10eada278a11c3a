//! Error types for the command framework.

use thiserror::Error;

/// Raised when a command pattern or the handler prefix does not compile.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    /// The regular expression is invalid.
    #[error("invalid pattern '{pattern}': {source}")]
    Invalid {
        /// The offending pattern source.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },
}

impl PatternError {
    pub(crate) fn invalid(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::Invalid {
            pattern: pattern.into(),
            source,
        }
    }
}

/// A handler that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command '{command}' failed: {message}")]
pub struct HandlerFault {
    /// Name of the descriptor whose handler failed.
    pub command: String,
    /// Error text or panic payload.
    pub message: String,
    /// Whether the handler panicked rather than returning an error.
    pub panicked: bool,
}

/// Result type for pattern compilation.
pub type PatternResult<T> = Result<T, PatternError>;
