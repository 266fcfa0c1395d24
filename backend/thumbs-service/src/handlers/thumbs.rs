/// Read-only handlers for thumbnails and photo records
use actix_web::body::SizedStream;
use actix_web::{web, HttpResponse};
use tracing::debug;

use super::ApiState;
use crate::error::{AppError, Result};
use crate::models::content_type_for;

/// GET /api/thumbs/{filename}
///
/// Streams the stored thumbnail unmodified. The content type recorded by the
/// backend wins over the one guessed from the filename.
pub async fn get_thumbnail(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let filename = path.into_inner();
    if filename.trim().is_empty() {
        return Err(AppError::BadRequest("filename is required".to_string()));
    }

    let body = state.thumbs.get(&filename).await?;
    let content_type = body
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| content_type_for(&filename).to_string());
    let content_length = body.content_length();

    debug!(filename = %filename, content_type = %content_type, "Serving thumbnail");

    let mut response = HttpResponse::Ok();
    response.content_type(content_type);
    Ok(match content_length {
        Some(len) => response.body(SizedStream::new(len, body.into_stream())),
        None => response.streaming(body.into_stream()),
    })
}

/// GET /api/photos/{filename}
pub async fn get_photo(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let filename = path.into_inner();
    let record = state
        .repository
        .find(&filename)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("photo {filename}")))?;

    Ok(HttpResponse::Ok().json(record))
}
