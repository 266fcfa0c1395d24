//! Error types for object storage operations.

use thiserror::Error;

/// Result type alias for object storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to an object storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested object does not exist in the bucket
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The backend rejected or failed the request
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Reading or writing the object body failed
    #[error("Object body I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client could not be built from the supplied configuration
    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
