//! Thumbnail worker - runs one unit of work end to end
//!
//! 1. Download the original photo from the photos bucket
//! 2. Generate every configured thumbnail variant
//! 3. Upload each variant to the thumbs bucket
//! 4. Persist the photo record
//! 5. Announce completion on the worker exchange
//!
//! Steps 1-4 are all-or-nothing for the record: if anything fails the record
//! is not written and the error goes back to the caller. Thumbnails already
//! uploaded in step 3 stay orphaned until the photo is reprocessed, which
//! overwrites them because names are derived from (photo, dimension).

use bytes::Bytes;
use image::ImageFormat;
use object_storage::{ObjectBody, ObjectStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::processor::{ImageTransform, TransformError};
use crate::broker::EventPublisher;
use crate::db::{PhotoRepository, RepositoryError};
use crate::models::{
    format_content_type, output_format, thumbnail_filename, OutboundMessage, PhotoRecord,
    Thumbnail, ThumbnailRef, ThumbnailRequest,
};

/// Terminal failures of a unit of work
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to fetch source photo {filename}: {source}")]
    SourceFetch {
        filename: String,
        source: StorageError,
    },

    #[error("Failed to generate thumbnails for {filename}: {source}")]
    Transform {
        filename: String,
        source: TransformError,
    },

    #[error("Failed to store thumbnail {key}: {source}")]
    Storage { key: String, source: StorageError },

    #[error("Failed to persist photo record for {filename}: {source}")]
    Persistence {
        filename: String,
        source: RepositoryError,
    },
}

/// Collaborators of the worker, assembled once at startup
pub struct WorkerBundle {
    pub photo_storage: Arc<dyn ObjectStore>,
    pub thumb_storage: Arc<dyn ObjectStore>,
    pub repository: Arc<dyn PhotoRepository>,
    pub processor: Arc<dyn ImageTransform>,
    pub publisher: Arc<dyn EventPublisher>,
    /// Exchange receiving completion messages
    pub completion_exchange: String,
    /// Thumbnail sizes to produce for every photo
    pub dimensions: Vec<u32>,
}

/// Result of a successful unit of work
#[derive(Debug, Clone)]
pub struct WorkOutcome {
    pub message: OutboundMessage,
    /// False when the completion message could not be published
    pub published: bool,
}

pub struct ThumbnailWorker {
    bundle: WorkerBundle,
}

impl ThumbnailWorker {
    pub fn new(bundle: WorkerBundle) -> Self {
        Self { bundle }
    }

    pub fn dimensions(&self) -> &[u32] {
        &self.bundle.dimensions
    }

    /// Process one photo through fetch, transform, store, persist and publish.
    pub async fn process(&self, request: &ThumbnailRequest) -> Result<WorkOutcome, WorkerError> {
        let filename = request.filename.as_str();
        info!(filename = %filename, dimensions = ?request.dimensions, "Generating thumbnails");

        let original = self.fetch_original(filename).await?;
        let thumbnails = self
            .generate(filename, original, &request.dimensions)
            .await
            .map_err(|source| WorkerError::Transform {
                filename: filename.to_string(),
                source,
            })?;

        for thumbnail in &thumbnails {
            self.store(thumbnail).await?;
        }

        let refs: Vec<ThumbnailRef> = thumbnails.iter().map(Thumbnail::to_ref).collect();
        let record = PhotoRecord::new(filename, refs.clone());
        self.bundle
            .repository
            .save(&record)
            .await
            .map_err(|source| WorkerError::Persistence {
                filename: filename.to_string(),
                source,
            })?;

        let message = OutboundMessage::new(filename, refs);
        let published = self.announce(&message).await;

        info!(
            filename = %filename,
            thumbnails = thumbnails.len(),
            published,
            "Thumbnails created successfully"
        );

        Ok(WorkOutcome { message, published })
    }

    async fn fetch_original(&self, filename: &str) -> Result<Bytes, WorkerError> {
        let fetch = async {
            let body = self.bundle.photo_storage.get(filename).await?;
            body.collect().await
        };

        let data = fetch.await.map_err(|source| WorkerError::SourceFetch {
            filename: filename.to_string(),
            source,
        })?;

        debug!(filename = %filename, size = data.len(), "Downloaded original photo");
        Ok(data)
    }

    /// Build every variant before anything is stored, so a transform failure
    /// never leaves a partial set behind.
    async fn generate(
        &self,
        filename: &str,
        original: Bytes,
        dimensions: &[u32],
    ) -> Result<Vec<Thumbnail>, TransformError> {
        let targets: Vec<(u32, String, ImageFormat)> = dimensions
            .iter()
            .map(|&dimension| {
                let name = thumbnail_filename(filename, dimension);
                let format = output_format(&name);
                (dimension, name, format)
            })
            .collect();

        let processor = Arc::clone(&self.bundle.processor);
        tokio::task::spawn_blocking(move || {
            let image = processor.decode(&original)?;
            targets
                .into_iter()
                .map(|(dimension, filename, format)| {
                    let data = processor.resize(&image, dimension, format)?;
                    Ok(Thumbnail {
                        filename,
                        dimension,
                        content_type: format_content_type(format),
                        data,
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| TransformError::Task(e.to_string()))?
    }

    async fn store(&self, thumbnail: &Thumbnail) -> Result<(), WorkerError> {
        let body = ObjectBody::from_bytes(thumbnail.data.clone())
            .with_content_type(thumbnail.content_type);

        self.bundle
            .thumb_storage
            .put(&thumbnail.filename, body)
            .await
            .map_err(|source| WorkerError::Storage {
                key: thumbnail.filename.clone(),
                source,
            })?;

        debug!(
            key = %thumbnail.filename,
            size = thumbnail.data.len(),
            "Stored thumbnail"
        );
        Ok(())
    }

    /// Publish the completion message. Failure is logged, not returned: the
    /// record is already committed and stays committed.
    async fn announce(&self, message: &OutboundMessage) -> bool {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(filename = %message.filename, error = %e, "Failed to encode completion message");
                return false;
            }
        };

        match self
            .bundle
            .publisher
            .publish(&self.bundle.completion_exchange, &payload)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    filename = %message.filename,
                    exchange = %self.bundle.completion_exchange,
                    error = %e,
                    "Photo record saved but completion message was not published"
                );
                false
            }
        }
    }
}
