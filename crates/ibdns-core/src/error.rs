//! Error types for the ibdns system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for ibdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the ibdns system
#[derive(Error, Debug)]
pub enum Error {
    /// The record type matches none of A, AAAA, CNAME, HOST
    #[error("unknown record type: {0}")]
    UnknownType(String),

    /// Remote lookup failed (absent record or transport failure)
    #[error("{0}")]
    NotFound(String),

    /// Remote create call failed
    #[error("Failed to create record: {0}")]
    Create(String),

    /// Remote update call failed
    #[error("Failed to update record: {0}")]
    Update(String),

    /// Remote delete call failed
    #[error("{0}")]
    Delete(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem and other I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from the store API)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store-specific error
    #[error("Store error ({provider}): {message}")]
    Provider {
        /// Store name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an unknown record type error
    pub fn unknown_type(record_type: impl Into<String>) -> Self {
        Self::UnknownType(record_type.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a create-failure error
    pub fn create(msg: impl Into<String>) -> Self {
        Self::Create(msg.into())
    }

    /// Create an update-failure error
    pub fn update(msg: impl Into<String>) -> Self {
        Self::Update(msg.into())
    }

    /// Create a delete-failure error
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::Delete(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a store-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
