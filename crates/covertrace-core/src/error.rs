//! Error types for covertrace core.

use thiserror::Error;

/// Errors that can occur while building requests and wire records.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The target size cannot hold the request even with empty padding.
    ///
    /// This is a configuration bug, never a transient condition.
    #[error("padding overflow: target size {target_size} is below the {required} bytes required")]
    PaddingOverflow { target_size: usize, required: usize },

    #[error("body field {0:?} is reserved")]
    ReservedField(&'static str),

    #[error("request body must serialize to a JSON object")]
    NonObjectBody,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid otp: {0}")]
    InvalidOtp(String),

    #[error("unknown country code: {0}")]
    UnknownCountry(String),
}

impl CoreError {
    /// Whether retrying the same operation could ever succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::PaddingOverflow { .. } | CoreError::ReservedField(_) | CoreError::NonObjectBody
        )
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
