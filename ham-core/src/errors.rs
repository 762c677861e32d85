//! Error types for ham.
//!
//! Task-level failures stay typed by the caller's own error type (see
//! `ham-runtime`); this module covers the failures the library itself
//! produces: bad configuration, malformed call arguments and the like.

use thiserror::Error;

/// The main error type for ham operations.
#[derive(Error, Debug)]
pub enum HamError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A call argument was missing or could not be converted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HamError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type alias using HamError.
pub type Result<T> = std::result::Result<T, HamError>;
