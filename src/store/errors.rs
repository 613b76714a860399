//! Error types for record tables.

use thiserror::Error;

/// Result type for table operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record table errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Table reached its configured entry bound
    #[error("table full: {capacity} entries")]
    Capacity { capacity: usize },

    /// Insert conflicts with an existing record
    #[error("record already exists")]
    Duplicate,
}
