//! In-memory collaborators for pipeline and HTTP tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, Rgb, RgbImage};
use object_storage::{InMemoryObjectStore, ObjectBody, ObjectStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thumbs_service::broker::{EventPublisher, PublishError};
use thumbs_service::db::{PhotoRepository, RepositoryError, RepositoryResult};
use thumbs_service::models::PhotoRecord;
use thumbs_service::services::thumbnail::{
    ImageTransform, ThumbnailProcessor, ThumbnailWorker, TransformError, WorkerBundle,
};

pub const COMPLETION_EXCHANGE: &str = "thumbs.completed";

/// JPEG-encoded solid image
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 120, 200])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(90))
        .unwrap();
    buf
}

#[derive(Default)]
pub struct MemoryRepository {
    records: Mutex<HashMap<String, PhotoRecord>>,
    saves: Mutex<usize>,
    fail: AtomicBool,
}

impl MemoryRepository {
    pub fn fail_saves(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<PhotoRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn insert(&self, record: PhotoRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.filename.clone(), record);
    }
}

#[async_trait]
impl PhotoRepository for MemoryRepository {
    async fn save(&self, record: &PhotoRecord) -> RepositoryResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Corrupt("database unavailable".into()));
        }
        *self.saves.lock().unwrap() += 1;
        self.insert(record.clone());
        Ok(())
    }

    async fn find(&self, filename: &str) -> RepositoryResult<Option<PhotoRecord>> {
        Ok(self.records.lock().unwrap().get(filename).cloned())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn fail_publishes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, exchange: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::ChannelClosed {
                exchange: exchange.to_string(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((exchange.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Real processor that fails when asked for one particular dimension
pub struct FailingAt {
    pub dimension: u32,
    pub inner: ThumbnailProcessor,
}

impl ImageTransform for FailingAt {
    fn decode(&self, original: &[u8]) -> Result<DynamicImage, TransformError> {
        self.inner.decode(original)
    }

    fn resize(
        &self,
        image: &DynamicImage,
        dimension: u32,
        format: ImageFormat,
    ) -> Result<Bytes, TransformError> {
        if dimension == self.dimension {
            return Err(TransformError::Encode {
                format,
                dimension,
                message: "encoder exploded".into(),
            });
        }
        self.inner.resize(image, dimension, format)
    }
}

/// Store that refuses writes to one key and delegates everything else
pub struct RefusingStore {
    pub key: String,
    pub inner: InMemoryObjectStore,
}

#[async_trait]
impl ObjectStore for RefusingStore {
    async fn put(&self, key: &str, body: ObjectBody) -> StorageResult<()> {
        if key == self.key {
            return Err(StorageError::Backend("connection reset".into()));
        }
        self.inner.put(key, body).await
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectBody> {
        self.inner.get(key).await
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }
}

/// Worker wired to in-memory collaborators
pub struct Harness {
    pub photos: InMemoryObjectStore,
    pub thumbs: InMemoryObjectStore,
    pub repository: Arc<MemoryRepository>,
    pub publisher: Arc<RecordingPublisher>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            photos: InMemoryObjectStore::new("photos"),
            thumbs: InMemoryObjectStore::new("thumbs"),
            repository: Arc::new(MemoryRepository::default()),
            publisher: Arc::new(RecordingPublisher::default()),
        }
    }

    pub fn worker(&self, dimensions: &[u32]) -> ThumbnailWorker {
        self.worker_with(
            dimensions,
            Arc::new(ThumbnailProcessor::default()),
            Arc::new(self.thumbs.clone()),
        )
    }

    pub fn worker_with(
        &self,
        dimensions: &[u32],
        processor: Arc<dyn ImageTransform>,
        thumb_storage: Arc<dyn ObjectStore>,
    ) -> ThumbnailWorker {
        ThumbnailWorker::new(WorkerBundle {
            photo_storage: Arc::new(self.photos.clone()),
            thumb_storage,
            repository: self.repository.clone(),
            processor,
            publisher: self.publisher.clone(),
            completion_exchange: COMPLETION_EXCHANGE.to_string(),
            dimensions: dimensions.to_vec(),
        })
    }
}
