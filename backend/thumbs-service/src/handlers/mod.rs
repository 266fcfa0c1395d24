/// HTTP handlers
///
/// - Thumbs: stream a stored thumbnail by filename
/// - Photos: processed photo records
/// - Health: liveness and readiness probes
pub mod health;
pub mod thumbs;

use actix_web::web;
use object_storage::ObjectStore;
use std::sync::Arc;

use crate::db::PhotoRepository;

pub use health::{health, live, ready};
pub use thumbs::{get_photo, get_thumbnail};

/// Shared state for every handler
#[derive(Clone)]
pub struct ApiState {
    pub thumbs: Arc<dyn ObjectStore>,
    pub repository: Arc<dyn PhotoRepository>,
}

/// Register all routes on an actix `App` or scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/health", web::get().to(health))
        .route("/api/v1/health/ready", web::get().to(ready))
        .route("/api/v1/health/live", web::get().to(live))
        .service(
            web::scope("/api")
                .route("/thumbs/{filename:.*}", web::get().to(get_thumbnail))
                .route("/photos/{filename:.*}", web::get().to(get_photo)),
        );
}
