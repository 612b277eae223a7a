//! Error types for the detection module.

use thiserror::Error;

/// Errors reported by the matching capability and the key chunk provider.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The capability refused because the user has not granted permission.
    #[error("exposure notifications are not authorized")]
    NotAuthorized,

    /// The capability failed for a platform-specific reason.
    #[error("exposure notification provider failed: {0}")]
    Provider(String),

    /// Key chunks could not be obtained or stored.
    #[error("key chunk provider failed: {0}")]
    Keys(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] covertrace_core::CoreError),
}

/// Result type for detection operations.
pub type Result<T> = std::result::Result<T, DetectError>;
