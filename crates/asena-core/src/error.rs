//! Unified error types for the asena core.
//!
//! Framework-level errors (pattern compilation, handler faults) live in
//! `asena-framework`; configuration and runtime errors live in `asena-runtime`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while talking to the protocol bridge.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The bridge rejected or never completed the login handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Frame send failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for outbound API calls (`sendMessage`, `groupMetadata`, ...).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The session is not connected.
    #[error("session is not connected")]
    NotConnected,
    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,
    /// The bridge answered with a failure.
    #[error("API error on '{action}': {message}")]
    Remote { action: String, message: String },
    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The own account identity is not known yet.
    #[error("own identity not available before login")]
    NoIdentity,
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by session, paused-chat and message stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored data could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

// =============================================================================
// Normalization Errors
// =============================================================================

/// Errors raised while turning a raw upsert payload into a message record.
#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    /// A required field is absent from the payload.
    #[error("missing field '{0}' in message payload")]
    MissingField(&'static str),
    /// The payload had an unexpected shape.
    #[error("malformed message payload: {0}")]
    Malformed(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
