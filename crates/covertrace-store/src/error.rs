//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during chunk store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Chunk names are flat file names; separators and dot segments are refused.
    #[error("invalid chunk name: {0:?}")]
    InvalidName(String),

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
