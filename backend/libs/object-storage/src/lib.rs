//! Backend-agnostic object storage for Nova-style services
//!
//! Callers depend only on [`ObjectStore`]; which backend sits behind it is a
//! wiring decision made once at startup:
//! - [`S3ObjectStore`] for AWS S3 and self-hosted MinIO
//! - [`GcsObjectStore`] for Google Cloud Storage via signed URLs
//! - [`InMemoryObjectStore`] for tests and local runs

use async_trait::async_trait;

pub mod body;
pub mod config;
pub mod error;
pub mod gcs;
pub mod memory;
pub mod s3;

pub use body::ObjectBody;
pub use config::{GcsConfig, S3Config};
pub use error::{StorageError, StorageResult};
pub use gcs::{GcsClient, GcsObjectStore};
pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

/// Named byte streams in a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` under `key`, replacing any existing object.
    ///
    /// Returns only after the backend has acknowledged the complete object.
    /// An error while reading `body` or finishing the upload means the object
    /// must be treated as not written.
    async fn put(&self, key: &str, body: ObjectBody) -> StorageResult<()>;

    /// Open `key` for reading. The returned body is pulled lazily.
    ///
    /// Returns [`StorageError::NotFound`] when the key does not exist.
    async fn get(&self, key: &str) -> StorageResult<ObjectBody>;

    /// Bucket this store reads from and writes to
    fn bucket(&self) -> &str;
}
