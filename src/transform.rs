//! Decode, colour-normalize and resize fetched cover bytes.

use image::imageops::FilterType;
use image::DynamicImage;

use crate::encode::{Encoded, FallbackEncoder};
use crate::error::RecordError;

/// Convert to a mode every encoder accepts: 8-bit gray or 8-bit RGB.
///
/// Alpha, 16-bit and float variants all become RGB8; transparency is dropped.
pub fn normalize_color(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Target size for an image of `width`×`height` capped at `max_width`.
///
/// Returns `None` when no resize is needed (`max_width` is 0 or the image
/// already fits). Height is `round(height * max_width / width)`, at least 1.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> Option<(u32, u32)> {
    if max_width == 0 || width <= max_width {
        return None;
    }
    let new_height = (f64::from(height) * f64::from(max_width) / f64::from(width)).round() as u32;
    Some((max_width, new_height.max(1)))
}

/// Downscale with Lanczos3 when wider than `max_width`.
pub fn fit_width(image: DynamicImage, max_width: u32) -> DynamicImage {
    match scaled_dimensions(image.width(), image.height(), max_width) {
        Some((w, h)) => image.resize_exact(w, h, FilterType::Lanczos3),
        None => image,
    }
}

/// Full transform for one record: decode → normalize → resize → encode.
///
/// Nothing is written here; the caller persists the result only on success.
pub fn transform(
    bytes: &[u8],
    encoder: &FallbackEncoder,
    quality: u8,
    max_width: u32,
    identifier: &str,
) -> Result<Encoded, RecordError> {
    let decoded = image::load_from_memory(bytes)?;
    let image = fit_width(normalize_color(decoded), max_width);
    Ok(encoder.encode(&image, quality, identifier)?)
}
