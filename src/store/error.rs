//! Store error definitions

use std::error::Error;
use std::fmt;

/// Store error types
///
/// `HandleInvalid` is distinguished from all other failures: it signals that
/// the connection object backing the store is no longer usable and must be
/// rebuilt before retrying. Every other variant is a per-operation failure
/// that the worker loop contains.
#[derive(Debug)]
pub enum StoreError {
    /// The connection handle is unusable and must be re-established
    HandleInvalid(String),
    /// Database not found
    DatabaseNotFound(String),
    /// Collection not found
    CollectionNotFound(String),
    /// Duplicate primary key on insert
    DuplicateKey(i64),
    /// Filter or update references an unknown field
    UnknownField(String),
    /// Any other store-side failure
    Other(String),
}

impl StoreError {
    /// True for the distinguished handle-invalid condition
    pub fn is_handle_invalid(&self) -> bool {
        matches!(self, StoreError::HandleInvalid(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::HandleInvalid(msg) => write!(f, "Store handle invalid: {}", msg),
            StoreError::DatabaseNotFound(name) => write!(f, "Database not found: {}", name),
            StoreError::CollectionNotFound(name) => write!(f, "Collection not found: {}", name),
            StoreError::DuplicateKey(id) => write!(f, "Duplicate key: {}", id),
            StoreError::UnknownField(name) => write!(f, "Unknown field: {}", name),
            StoreError::Other(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl Error for StoreError {}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
