/// Streaming object bodies shared by every backend
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::io;

use crate::error::StorageResult;

/// A lazily-read object payload.
///
/// Backends hand out bodies that pull from the network as the consumer polls,
/// so a large object never has to sit in memory unless the caller collects it.
pub struct ObjectBody {
    stream: BoxStream<'static, io::Result<Bytes>>,
    content_length: Option<u64>,
    content_type: Option<String>,
}

impl ObjectBody {
    /// Wrap an arbitrary chunk stream
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            content_length: None,
            content_type: None,
        }
    }

    /// Body backed by an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self {
            stream: stream::once(async move { Ok(data) }).boxed(),
            content_length: Some(len),
            content_type: None,
        }
    }

    pub fn with_content_length(mut self, len: u64) -> Self {
        self.content_length = Some(len);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Drain the body into one contiguous buffer.
    ///
    /// Fails on the first chunk error; nothing partial is returned.
    pub async fn collect(mut self) -> StorageResult<Bytes> {
        let capacity = self.content_length.unwrap_or(0).min(64 * 1024 * 1024) as usize;
        let mut buf = BytesMut::with_capacity(capacity);
        while let Some(chunk) = self.stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        self.stream
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
