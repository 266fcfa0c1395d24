//! Broker-facing handler for thumbnail requests
//!
//! Receives decoded upload messages from the subscriber, validates them and
//! hands them to the worker. Knows nothing about AMQP: the subscriber turns
//! the returned result into ack/nack/reject.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::worker::{ThumbnailWorker, WorkerError};
use crate::models::{InboundMessage, ThumbnailRequest};

#[derive(Debug, Error)]
pub enum ConsumeError {
    /// Message can never succeed, redelivering it is pointless
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl ConsumeError {
    /// Whether another attempt at the same message might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConsumeError::Worker(_))
    }
}

/// Handles one decoded message; implemented by [`ThumbnailConsumer`]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Result<(), ConsumeError>;
}

pub struct ThumbnailConsumer {
    worker: Arc<ThumbnailWorker>,
}

impl ThumbnailConsumer {
    pub fn new(worker: Arc<ThumbnailWorker>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl MessageHandler for ThumbnailConsumer {
    async fn handle(&self, message: InboundMessage) -> Result<(), ConsumeError> {
        if message.filename.trim().is_empty() {
            return Err(ConsumeError::InvalidMessage(
                "filename must not be empty".to_string(),
            ));
        }

        if !message.is_upload() {
            debug!(
                filename = %message.filename,
                event = ?message.event_name,
                "Ignoring non-upload bucket event"
            );
            return Ok(());
        }

        let request = ThumbnailRequest::new(&message.filename, self.worker.dimensions());
        match self.worker.process(&request).await {
            Ok(outcome) => {
                info!(
                    filename = %request.filename,
                    thumbnails = outcome.message.thumbnails.len(),
                    "Thumbnail request completed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(filename = %request.filename, error = %e, "Thumbnail request failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_storage::StorageError;

    #[test]
    fn test_invalid_message_is_not_retryable() {
        assert!(!ConsumeError::InvalidMessage("empty".into()).is_retryable());
    }

    #[test]
    fn test_worker_failure_is_retryable() {
        let err = ConsumeError::from(WorkerError::SourceFetch {
            filename: "a.jpg".into(),
            source: StorageError::not_found("photos", "a.jpg"),
        });
        assert!(err.is_retryable());
    }
}
