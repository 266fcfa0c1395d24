//! Thumbnail generation
//!
//! - Image processor for resizing and encoding
//! - Worker coordinating fetch, transform, store, persist and publish
//! - Consumer adapting broker messages to worker requests

pub mod consumer;
pub mod processor;
pub mod worker;

pub use consumer::{ConsumeError, MessageHandler, ThumbnailConsumer};
pub use processor::{ImageTransform, ThumbnailProcessor, TransformError};
pub use worker::{ThumbnailWorker, WorkOutcome, WorkerBundle, WorkerError};
