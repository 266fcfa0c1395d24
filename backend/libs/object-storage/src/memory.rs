/// In-process object store
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;

use crate::body::ObjectBody;
use crate::error::{StorageError, StorageResult};
use crate::ObjectStore;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

/// Bucket held in memory. Clones share the same contents.
#[derive(Clone, Debug)]
pub struct InMemoryObjectStore {
    bucket: String,
    objects: Arc<DashMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: None,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sorted list of stored keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, body: ObjectBody) -> StorageResult<()> {
        let content_type = body.content_type().map(str::to_string);
        let data = body.collect().await?;
        self.objects
            .insert(key.to_string(), StoredObject { data, content_type });
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectBody> {
        let object = self
            .objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::not_found(&self.bucket, key))?;

        let body = ObjectBody::from_bytes(object.data);
        Ok(match object.content_type {
            Some(content_type) => body.with_content_type(content_type),
            None => body,
        })
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
