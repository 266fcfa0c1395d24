/// Object store wiring for the photos and thumbs buckets
use object_storage::s3::build_client;
use object_storage::{GcsClient, GcsObjectStore, ObjectStore, S3ObjectStore, StorageResult};
use std::sync::Arc;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

/// Source and destination buckets, sharing one backend client
pub struct ObjectStores {
    pub photos: Arc<dyn ObjectStore>,
    pub thumbs: Arc<dyn ObjectStore>,
}

pub async fn build_object_stores(config: &StorageConfig) -> StorageResult<ObjectStores> {
    let stores = match &config.backend {
        StorageBackend::Minio(s3) => {
            let client = Arc::new(build_client(s3).await);
            ObjectStores {
                photos: Arc::new(S3ObjectStore::new(Arc::clone(&client), &config.photos_bucket)),
                thumbs: Arc::new(S3ObjectStore::new(client, &config.thumbs_bucket)),
            }
        }
        StorageBackend::Gcs(gcs) => {
            let client = Arc::new(GcsClient::from_config(gcs)?);
            ObjectStores {
                photos: Arc::new(GcsObjectStore::new(Arc::clone(&client), &config.photos_bucket)),
                thumbs: Arc::new(GcsObjectStore::new(client, &config.thumbs_bucket)),
            }
        }
    };

    info!(
        photos_bucket = %stores.photos.bucket(),
        thumbs_bucket = %stores.thumbs.bucket(),
        "Object stores initialized"
    );
    Ok(stores)
}
