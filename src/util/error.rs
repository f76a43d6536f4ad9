//! Error types for the sky-occlusion baker.

use thiserror::Error;

/// Main error type for baking operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid partition or settings parameters. Raised before anything is allocated.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Buffer or acceleration structure allocation failed, or a dispatch
    /// failed on the device. The baker must be disposed and recreated.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Operation is not valid in the baker's current state
    #[error("Invalid baker state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error from a string.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a resource error from a string.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }
}

/// Result type alias for baking operations.
pub type Result<T> = std::result::Result<T, Error>;
