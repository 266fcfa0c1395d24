/// Data models for thumbs-service
///
/// This module defines structures for:
/// - Thumbnails: naming, formats and generated variants
/// - Photos: the persisted photo/thumbnail association
/// - Messages: inbound upload events and outbound completion events
///
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

pub mod messages;

pub use messages::{DecodeError, InboundMessage, OutboundMessage};

// ========================================
// Thumbnail Models
// ========================================

/// One unit of work: the source photo and every dimension to derive from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub filename: String,
    pub dimensions: Vec<u32>,
}

impl ThumbnailRequest {
    pub fn new(filename: impl Into<String>, dimensions: &[u32]) -> Self {
        Self {
            filename: filename.into(),
            dimensions: dimensions.to_vec(),
        }
    }
}

/// A generated thumbnail, held in memory until it is stored
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub filename: String,
    pub dimension: u32,
    pub content_type: &'static str,
    pub data: Bytes,
}

impl Thumbnail {
    pub fn to_ref(&self) -> ThumbnailRef {
        ThumbnailRef {
            filename: self.filename.clone(),
            dimension: self.dimension,
        }
    }
}

/// Stored thumbnail reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRef {
    pub filename: String,
    pub dimension: u32,
}

/// Storage key for the `dimension` variant of `source`.
///
/// `_<dimension>` is inserted before the extension of the last path segment:
/// `albums/photo123.jpg` becomes `albums/photo123_100.jpg`. The result depends
/// only on its inputs, so reprocessing a photo overwrites the same keys.
pub fn thumbnail_filename(source: &str, dimension: u32) -> String {
    let (dir, name) = match source.rfind('/') {
        Some(idx) => source.split_at(idx + 1),
        None => ("", source),
    };

    match name.rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, ext) = name.split_at(dot);
            format!("{dir}{stem}_{dimension}{ext}")
        }
        _ => format!("{dir}{name}_{dimension}"),
    }
}

/// Encoding used for a thumbnail, picked from the filename extension.
///
/// Formats the encoder cannot write fall back to JPEG.
pub fn output_format(filename: &str) -> ImageFormat {
    match ImageFormat::from_path(filename) {
        Ok(
            format @ (ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::Gif
            | ImageFormat::Bmp),
        ) => format,
        _ => ImageFormat::Jpeg,
    }
}

/// MIME type of an encoded thumbnail
pub fn format_content_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Content type to serve for a stored thumbnail when the backend has none
/// recorded.
///
/// Thumbnails keep their source extension, so a `.webp` key holds JPEG bytes;
/// the type follows the encoding [`output_format`] picked for that name.
pub fn content_type_for(filename: &str) -> &'static str {
    format_content_type(output_format(filename))
}

// ========================================
// Photo Models
// ========================================

/// Persisted association between a source photo and its thumbnails.
///
/// Written only after every thumbnail of the request has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub filename: String,
    pub thumbnails: Vec<ThumbnailRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PhotoRecord {
    pub fn new(filename: impl Into<String>, thumbnails: Vec<ThumbnailRef>) -> Self {
        Self {
            filename: filename.into(),
            thumbnails,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_filename_inserts_dimension() {
        assert_eq!(thumbnail_filename("photo123.jpg", 100), "photo123_100.jpg");
        assert_eq!(thumbnail_filename("photo123.jpg", 400), "photo123_400.jpg");
    }

    #[test]
    fn test_thumbnail_filename_nested_path() {
        assert_eq!(
            thumbnail_filename("2024/trip.v2/photo.png", 200),
            "2024/trip.v2/photo_200.png"
        );
    }

    #[test]
    fn test_thumbnail_filename_without_extension() {
        assert_eq!(thumbnail_filename("photo123", 100), "photo123_100");
        assert_eq!(thumbnail_filename(".hidden", 100), ".hidden_100");
    }

    #[test]
    fn test_thumbnail_filename_is_deterministic() {
        assert_eq!(
            thumbnail_filename("a/b.jpeg", 64),
            thumbnail_filename("a/b.jpeg", 64)
        );
    }

    #[test]
    fn test_output_format_follows_extension() {
        assert_eq!(output_format("a.png"), ImageFormat::Png);
        assert_eq!(output_format("a.JPG"), ImageFormat::Jpeg);
        assert_eq!(output_format("a.heic"), ImageFormat::Jpeg);
        assert_eq!(output_format("a.webp"), ImageFormat::Jpeg);
        assert_eq!(output_format("noext"), ImageFormat::Jpeg);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("photo_100.jpg"), "image/jpeg");
        assert_eq!(content_type_for("photo_100.PNG"), "image/png");
        assert_eq!(content_type_for("photo_100.gif"), "image/gif");
        assert_eq!(content_type_for("photo_100"), "image/jpeg");
    }

    #[test]
    fn test_content_type_matches_fallback_encoding() {
        for name in ["photo_100.webp", "scan_400.tiff", "raw_100.heic"] {
            assert_eq!(
                content_type_for(name),
                format_content_type(output_format(name)),
                "{name}"
            );
            assert_eq!(content_type_for(name), "image/jpeg", "{name}");
        }
    }
}
