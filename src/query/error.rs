//! Query error types
//!
//! Defines all error conditions that can occur while building and running
//! a historical query.

use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// The requested lookback window cannot be turned into a time range
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
