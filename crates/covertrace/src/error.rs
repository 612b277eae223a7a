//! Error types for the service layer.

use covertrace_core::CoreError;
use covertrace_detect::DetectError;
use covertrace_net::NetworkError;
use covertrace_store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request building or wire record error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Backend error.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Matching capability or key provider error.
    #[error("detection error: {0}")]
    Detect(#[from] DetectError),

    /// The remote configuration cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration or state document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
