//! Thumbs Service
//!
//! Generates thumbnails for uploaded photos. Upload events arrive on a
//! RabbitMQ fanout exchange; each photo is resized to the configured
//! dimensions, stored, recorded in PostgreSQL and announced on the worker
//! exchange. Stored thumbnails are served over HTTP.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod services;
pub mod storage;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
