//! Cover encoder abstraction and implementations.
//!
//! Defines the [`CoverEncoder`] trait and one implementation per output
//! format:
//! - **[`WebpEncoder`]**: lossy WebP via libwebp, method 6. The default and
//!   the fallback for AVIF.
//! - **[`AvifEncoder`]**: AVIF via `image`'s rav1e encoder. Only compiled in
//!   with `--features avif`; otherwise it reports [`EncodeError::Unavailable`].
//! - **[`JpegEncoder`]**: progressive JPEG with optimized Huffman tables.
//!
//! # Fallback
//!
//! [`FallbackEncoder`] wraps a primary encoder and, for AVIF, a WebP
//! fallback. When AVIF fails for any reason the record is re-encoded as WebP,
//! and the returned [`Encoded`] says which format was actually produced so
//! the artifact gets the right extension.
//!
//! ```rust
//! use bookshelf::encode::{encoder_for, CoverFormat};
//!
//! let encoder = encoder_for(CoverFormat::Jpeg);
//! assert_eq!(encoder.format(), CoverFormat::Jpeg);
//! ```

use std::fmt;

use image::DynamicImage;
use serde::Deserialize;
use tracing::warn;

use crate::error::EncodeError;

/// Output formats for cover artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CoverFormat {
    /// Lossy WebP (default).
    Webp,
    /// AVIF, when compiled with the `avif` feature.
    Avif,
    /// Progressive JPEG.
    Jpeg,
}

impl CoverFormat {
    /// Every format, in the order cover lookups try them.
    pub const ALL: [CoverFormat; 3] = [CoverFormat::Webp, CoverFormat::Avif, CoverFormat::Jpeg];

    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            CoverFormat::Webp => "webp",
            CoverFormat::Avif => "avif",
            CoverFormat::Jpeg => "jpg",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CoverFormat::Webp => "webp",
            CoverFormat::Avif => "avif",
            CoverFormat::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for CoverFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encodes a decoded, colour-normalized image into one output format.
pub trait CoverEncoder: Send + Sync {
    /// The format this encoder produces.
    fn format(&self) -> CoverFormat;

    /// Encode `image` at `quality` (0-100).
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError>;
}

/// Bytes produced for one record, tagged with the format actually used.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub format: CoverFormat,
    pub bytes: Vec<u8>,
    /// True when the requested format failed and the fallback was used.
    pub fell_back: bool,
}

/// Build the encoder for `format`.
pub fn encoder_for(format: CoverFormat) -> Box<dyn CoverEncoder> {
    match format {
        CoverFormat::Webp => Box::new(WebpEncoder),
        CoverFormat::Avif => Box::new(AvifEncoder),
        CoverFormat::Jpeg => Box::new(JpegEncoder),
    }
}

/// Build the run's encoder for `format`, checking optional codecs once.
///
/// When AVIF is requested but not compiled in, this warns a single time and
/// returns a plain WebP encoder, so artifacts and idempotency checks use the
/// `.webp` name for the whole run.
pub fn resolve_encoder(format: CoverFormat) -> FallbackEncoder {
    if format == CoverFormat::Avif && !AvifEncoder::is_available() {
        warn!("AVIF support not compiled in (enable the `avif` feature); writing WebP instead");
        return FallbackEncoder::new(Box::new(WebpEncoder));
    }
    FallbackEncoder::new(encoder_for(format))
}

// ============ WebP ============

/// Lossy WebP encoder, best-effort compression (method 6).
pub struct WebpEncoder;

/// libwebp's slowest and smallest compression method.
const WEBP_METHOD: i32 = 6;

impl CoverEncoder for WebpEncoder {
    fn format(&self) -> CoverFormat {
        CoverFormat::Webp
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let failed = |message: String| EncodeError::Failed {
            format: "webp",
            message,
        };

        // libwebp takes interleaved RGB; grayscale is expanded here.
        let rgb = image.to_rgb8();
        let encoder = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height());

        let mut config =
            webp::WebPConfig::new().map_err(|_| failed("invalid libwebp config".to_string()))?;
        config.lossless = 0;
        config.quality = f32::from(quality.min(100));
        config.method = WEBP_METHOD;

        let memory = encoder
            .encode_advanced(&config)
            .map_err(|e| failed(format!("{:?}", e)))?;
        Ok(memory.to_vec())
    }
}

// ============ AVIF ============

/// AVIF encoder backed by `image`'s rav1e integration.
pub struct AvifEncoder;

/// rav1e speed preset: 1 is slowest/smallest, 10 fastest.
#[cfg(feature = "avif")]
const AVIF_SPEED: u8 = 4;

impl AvifEncoder {
    /// Whether this build can produce AVIF at all.
    pub fn is_available() -> bool {
        cfg!(feature = "avif")
    }
}

impl CoverEncoder for AvifEncoder {
    fn format(&self) -> CoverFormat {
        CoverFormat::Avif
    }

    #[cfg(feature = "avif")]
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
            &mut out,
            AVIF_SPEED,
            quality.clamp(1, 100),
        );
        image
            .write_with_encoder(encoder)
            .map_err(|e| EncodeError::Failed {
                format: "avif",
                message: e.to_string(),
            })?;
        Ok(out)
    }

    #[cfg(not(feature = "avif"))]
    fn encode(&self, _image: &DynamicImage, _quality: u8) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::Unavailable("avif"))
    }
}

// ============ JPEG ============

/// Progressive JPEG encoder with optimized Huffman tables.
pub struct JpegEncoder;

impl CoverEncoder for JpegEncoder {
    fn format(&self) -> CoverFormat {
        CoverFormat::Jpeg
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let failed = |message: String| EncodeError::Failed {
            format: "jpeg",
            message,
        };

        let (width, height) = (
            u16::try_from(image.width()).map_err(|_| failed("width exceeds 65535".into()))?,
            u16::try_from(image.height()).map_err(|_| failed("height exceeds 65535".into()))?,
        );

        let mut out = Vec::new();
        let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality.clamp(1, 100));
        encoder.set_progressive(true);
        encoder.set_optimized_huffman_tables(true);

        let result = match image {
            DynamicImage::ImageLuma8(gray) => {
                encoder.encode(gray.as_raw(), width, height, jpeg_encoder::ColorType::Luma)
            }
            other => {
                let rgb = other.to_rgb8();
                encoder.encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
            }
        };
        result.map_err(|e| failed(e.to_string()))?;
        Ok(out)
    }
}

// ============ Fallback ============

/// A primary encoder with an optional fallback for when the primary fails.
///
/// Only AVIF gets a fallback (WebP); WebP and JPEG failures are returned
/// as-is so the record is skipped.
pub struct FallbackEncoder {
    primary: Box<dyn CoverEncoder>,
    fallback: Option<Box<dyn CoverEncoder>>,
}

impl FallbackEncoder {
    pub fn new(primary: Box<dyn CoverEncoder>) -> Self {
        let fallback: Option<Box<dyn CoverEncoder>> = match primary.format() {
            CoverFormat::Avif => Some(Box::new(WebpEncoder)),
            CoverFormat::Webp | CoverFormat::Jpeg => None,
        };
        Self { primary, fallback }
    }

    pub fn with_fallback(primary: Box<dyn CoverEncoder>, fallback: Box<dyn CoverEncoder>) -> Self {
        let fallback = (fallback.format() != primary.format()).then_some(fallback);
        Self { primary, fallback }
    }

    /// Format the run asks for; fallback artifacts may still be written as WebP.
    pub fn requested_format(&self) -> CoverFormat {
        self.primary.format()
    }

    /// Every format a record's artifact can end up in, primary first.
    pub fn formats(&self) -> Vec<CoverFormat> {
        std::iter::once(self.primary.format())
            .chain(self.fallback.as_ref().map(|f| f.format()))
            .collect()
    }

    /// Encode with the primary; on failure, warn and use the fallback if any.
    pub fn encode(
        &self,
        image: &DynamicImage,
        quality: u8,
        identifier: &str,
    ) -> Result<Encoded, EncodeError> {
        let err = match self.primary.encode(image, quality) {
            Ok(bytes) => {
                return Ok(Encoded {
                    format: self.primary.format(),
                    bytes,
                    fell_back: false,
                })
            }
            Err(err) => err,
        };
        let Some(fallback) = &self.fallback else {
            return Err(err);
        };

        warn!(
            identifier,
            error = %err,
            "{} unavailable, falling back to {}",
            self.primary.format(),
            fallback.format()
        );
        let bytes = fallback.encode(image, quality)?;
        Ok(Encoded {
            format: fallback.format(),
            bytes,
            fell_back: true,
        })
    }
}
