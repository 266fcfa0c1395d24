/// Database access layer
///
/// This module provides:
/// - The `PhotoRepository` seam used by the worker and HTTP handlers
/// - A PostgreSQL implementation with embedded migrations
use async_trait::async_trait;
use thiserror::Error;

use crate::models::PhotoRecord;

pub mod photo_repo;

pub use photo_repo::PgPhotoRepository;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Storage for photo records
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Store `record`, replacing any previous record for the same photo.
    ///
    /// The photo row and its thumbnail rows are written atomically.
    async fn save(&self, record: &PhotoRecord) -> RepositoryResult<()>;

    async fn find(&self, filename: &str) -> RepositoryResult<Option<PhotoRecord>>;
}
