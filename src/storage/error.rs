//! Storage engine error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite reported an error (constraint violation, busy timeout, corrupt file, ...)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be decoded
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// A blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
