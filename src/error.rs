//! Error types for grid operations

use thiserror::Error;

/// Failure reported by a [`Backend`](crate::io::backend::Backend) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("write rejected: {0}")]
    Rejected(String),

    /// A batched write was applied to some rows but not others.
    #[error("batch partially applied: {0}")]
    PartiallyApplied(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Core error type for grid, edit, bulk and upload operations
#[derive(Error, Debug)]
pub enum GridError {
    /// Malformed input, rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote store rejected a write; local state was rolled back.
    #[error("Mutation error: {0}")]
    Mutation(#[from] BackendError),

    /// A bulk write was partially applied; the row store was refetched.
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GridError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy(message.into())
    }
}

/// Result type alias for grid operations
pub type Result<T> = std::result::Result<T, GridError>;

pub type BackendResult<T> = std::result::Result<T, BackendError>;
