//! Turns uploads into request payloads, downsizing anything larger than the
//! remote payload limit allows.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageFormat};
use tracing::info;

use crate::error::AppError;
use crate::models::{EncodedPayload, SourceImage};

pub const JPEG_QUALITY: u8 = 90;

/// Proportional fit of `width`x`height` inside a `max` square. The longer side
/// becomes exactly `max`; the shorter one is rounded to the nearest pixel.
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scaled = |short: u32, long: u32| -> u32 {
        let value = (short as f64 * max as f64 / long as f64).round() as u32;
        value.max(1)
    };
    if width > height {
        (max, scaled(height, width))
    } else {
        (scaled(width, height), max)
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(bytes).map_err(|e| AppError::Decode(format!("Could not decode the image: {e}")))
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| AppError::Decode(format!("PNG encoding failed: {e}")))?;
    Ok(out)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::new();
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| AppError::Decode(format!("JPEG encoding failed: {e}")))?;
    Ok(out)
}

/// Synchronous body of [`resize_image`].
pub fn resize_image_blocking(source: &SourceImage, max_dimension: u32) -> Result<EncodedPayload, AppError> {
    let (target_w, target_h) = target_dimensions(source.width, source.height, max_dimension);
    if (target_w, target_h) == (source.width, source.height) {
        info!("📐 {}x{} within {}px bound, passing through", source.width, source.height, max_dimension);
        return Ok(EncodedPayload::from_bytes(&source.bytes, source.mime_type.clone()));
    }

    let decoded = decode(&source.bytes)?;
    let resized = decoded.resize_exact(target_w, target_h, FilterType::Triangle);
    info!(
        "📐 Downsized {}x{} -> {}x{} (bound {}px)",
        source.width, source.height, target_w, target_h, max_dimension
    );

    if source.is_png() {
        Ok(EncodedPayload::from_bytes(&encode_png(&resized)?, "image/png"))
    } else {
        Ok(EncodedPayload::from_bytes(&encode_jpeg(&resized, JPEG_QUALITY)?, "image/jpeg"))
    }
}

/// Encodes `source` for upload, resizing on the blocking pool.
pub async fn resize_image(source: SourceImage, max_dimension: u32) -> Result<EncodedPayload, AppError> {
    tokio::task::spawn_blocking(move || resize_image_blocking(&source, max_dimension))
        .await
        .map_err(|e| AppError::Decode(format!("image task failed: {e}")))?
}
