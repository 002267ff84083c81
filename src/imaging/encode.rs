//! Lossless serialization of output cells.
//!
//! Both encoders are pure Rust and deterministic for identical pixels, so the
//! same sheet always yields byte-identical cells.

use super::params::OutputFormat;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("{format:?} encode failed: {source}")]
pub struct EncodeError {
    pub format: OutputFormat,
    #[source]
    pub source: image::ImageError,
}

/// Encode RGBA pixels into an in-memory file of the given format.
pub fn encode_cell(image: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    let (w, h) = image.dimensions();
    let result = match format {
        OutputFormat::Png => PngEncoder::new_with_quality(
            &mut bytes,
            CompressionType::Best,
            PngFilter::Adaptive,
        )
        .write_image(image.as_raw(), w, h, ExtendedColorType::Rgba8),
        OutputFormat::WebP => {
            WebPEncoder::new_lossless(&mut bytes).write_image(
                image.as_raw(),
                w,
                h,
                ExtendedColorType::Rgba8,
            )
        }
    };
    result.map_err(|source| EncodeError { format, source })?;
    Ok(bytes)
}
