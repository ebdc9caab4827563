//! Error types for the discovery store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("environment not found: {0}")]
    NotFound(String),
}
