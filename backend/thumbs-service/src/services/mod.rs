/// Service layer
///
/// Thumbnail generation pipeline driven by broker messages.
pub mod thumbnail;

pub use thumbnail::{
    ConsumeError, MessageHandler, ThumbnailConsumer, ThumbnailProcessor, ThumbnailWorker,
    WorkerBundle,
};
