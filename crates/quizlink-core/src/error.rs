//! Error types for the Quizlink core library.

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using the Quizlink core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Quizlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Document store read/write error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
