//! Thumbnail processor - derives resized variants from an original image
//!
//! Each variant is scaled so its longest side matches the requested dimension
//! while keeping the aspect ratio, then encoded in the requested format.
//! Images already within the bound are re-encoded without upscaling.
//!
//! Everything here is CPU-bound and synchronous; the worker runs it on the
//! blocking thread pool.

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode {format:?} thumbnail at {dimension}px: {message}")]
    Encode {
        format: ImageFormat,
        dimension: u32,
        message: String,
    },

    #[error("Thumbnail task failed: {0}")]
    Task(String),
}

/// Image decoding and resizing used by the worker
pub trait ImageTransform: Send + Sync {
    fn decode(&self, original: &[u8]) -> Result<DynamicImage, TransformError>;

    /// Produce the `dimension` variant of `image`, encoded as `format`
    fn resize(
        &self,
        image: &DynamicImage,
        dimension: u32,
        format: ImageFormat,
    ) -> Result<Bytes, TransformError>;
}

/// [`ImageTransform`] backed by the `image` crate
#[derive(Clone, Debug)]
pub struct ThumbnailProcessor {
    /// JPEG quality (1-100)
    quality: u8,
}

impl ThumbnailProcessor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Target size for `dimension`, never larger than the original
    fn calculate_dimensions(width: u32, height: u32, dimension: u32) -> (u32, u32) {
        if width <= dimension && height <= dimension {
            return (width, height);
        }

        if width >= height {
            let ratio = dimension as f32 / width as f32;
            (dimension, ((height as f32) * ratio).round().max(1.0) as u32)
        } else {
            let ratio = dimension as f32 / height as f32;
            (((width as f32) * ratio).round().max(1.0) as u32, dimension)
        }
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat, dimension: u32) -> Result<Bytes, TransformError> {
        let output = match format {
            ImageFormat::Jpeg => ImageOutputFormat::Jpeg(self.quality),
            other => ImageOutputFormat::from(other),
        };

        // JPEG has no alpha channel.
        let img = if format == ImageFormat::Jpeg && img.color().has_alpha() {
            DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            img.clone()
        };

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), output)
            .map_err(|e| TransformError::Encode {
                format,
                dimension,
                message: e.to_string(),
            })?;

        Ok(Bytes::from(buf))
    }
}

impl Default for ThumbnailProcessor {
    fn default() -> Self {
        Self::new(85)
    }
}

impl ImageTransform for ThumbnailProcessor {
    fn decode(&self, original: &[u8]) -> Result<DynamicImage, TransformError> {
        image::load_from_memory(original).map_err(|e| TransformError::Decode(e.to_string()))
    }

    fn resize(
        &self,
        image: &DynamicImage,
        dimension: u32,
        format: ImageFormat,
    ) -> Result<Bytes, TransformError> {
        let (orig_w, orig_h) = image.dimensions();
        let (new_w, new_h) = Self::calculate_dimensions(orig_w, orig_h, dimension);

        let data = if (new_w, new_h) == (orig_w, orig_h) {
            self.encode(image, format, dimension)?
        } else {
            let resized = image.resize_exact(new_w, new_h, FilterType::Triangle);
            self.encode(&resized, format, dimension)?
        };

        debug!(
            dimension,
            width = new_w,
            height = new_h,
            size = data.len(),
            "Thumbnail variant generated"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_calculate_dimensions_landscape() {
        assert_eq!(ThumbnailProcessor::calculate_dimensions(1200, 800, 600), (600, 400));
    }

    #[test]
    fn test_calculate_dimensions_portrait() {
        assert_eq!(ThumbnailProcessor::calculate_dimensions(800, 1200, 600), (400, 600));
    }

    #[test]
    fn test_calculate_dimensions_never_upscales() {
        assert_eq!(ThumbnailProcessor::calculate_dimensions(50, 30, 100), (50, 30));
    }

    #[test]
    fn test_calculate_dimensions_extreme_ratio_keeps_one_pixel() {
        assert_eq!(ThumbnailProcessor::calculate_dimensions(4000, 1, 100), (100, 1));
    }

    #[test]
    fn test_resize_png_to_jpeg() {
        let processor = ThumbnailProcessor::default();
        let original = processor.decode(&png_bytes(400, 200)).unwrap();

        let data = processor.resize(&original, 100, ImageFormat::Jpeg).unwrap();
        let thumb = image::load_from_memory(&data).unwrap();
        assert_eq!(thumb.dimensions(), (100, 50));
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_resize_keeps_png_format() {
        let processor = ThumbnailProcessor::default();
        let original = processor.decode(&png_bytes(300, 300)).unwrap();

        let data = processor.resize(&original, 30, ImageFormat::Png).unwrap();
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Png);
        assert_eq!(image::load_from_memory(&data).unwrap().dimensions(), (30, 30));
    }

    #[test]
    fn test_alpha_image_encodes_as_jpeg() {
        let processor = ThumbnailProcessor::default();
        let original = DynamicImage::ImageRgba8(RgbaImage::new(64, 64));
        assert!(processor.resize(&original, 32, ImageFormat::Jpeg).is_ok());
    }

    #[test]
    fn test_decode_rejects_non_image() {
        let processor = ThumbnailProcessor::default();
        assert!(matches!(
            processor.decode(b"definitely not an image"),
            Err(TransformError::Decode(_))
        ));
    }
}
