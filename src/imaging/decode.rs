//! Bytes → [`SourceImage`].
//!
//! The `image` crate's guessed-format reader handles almost everything, under
//! the reader's allocation limits. WebP gets a second route when that fails:
//! the container decoder is driven directly, without the reader's allocation
//! cap (the format itself caps dimensions at 16383), and an animated file
//! yields its first composited frame.
//!
//! | Signature | Path |
//! |---|---|
//! | PNG, JPEG, GIF, BMP, TIFF | `ImageReader` with guessed format and [`Limits`] |
//! | WebP (`RIFF....WEBP`) | `ImageReader`, then `WebPDecoder` explicitly |
//! | AVIF (`ftyp avif`) | `avif-parse` validates the container; no AV1 decoder is compiled in |
//! | QOI, OpenEXR | recognized, no decoder compiled in |
//! | anything else | [`DecodeError::Unrecognized`] |

use crate::types::{SourceFormat, SourceImage};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageError, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("input is empty")]
    Empty,
    #[error("unrecognized image signature")]
    Unrecognized,
    #[error("no decoder available for {0} input")]
    Unsupported(SourceFormat),
    #[error("{format} input exceeds decode limits: {reason}")]
    TooLarge {
        format: SourceFormat,
        reason: String,
    },
    #[error("corrupt {format} input: {reason}")]
    Corrupt {
        format: SourceFormat,
        reason: String,
    },
}

/// Classify the input by its magic bytes.
pub fn sniff_format(bytes: &[u8]) -> SourceFormat {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => SourceFormat::Png,
        [0xFF, 0xD8, 0xFF, ..] => SourceFormat::Jpeg,
        [b'G', b'I', b'F', b'8', ..] => SourceFormat::Gif,
        [b'B', b'M', ..] => SourceFormat::Bmp,
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => SourceFormat::Tiff,
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => SourceFormat::WebP,
        [_, _, _, _, b'f', b't', b'y', b'p', b'a', b'v', b'i', b'f' | b's', ..] => {
            SourceFormat::Avif
        }
        [b'q', b'o', b'i', b'f', ..] => SourceFormat::Qoi,
        [0x76, 0x2F, 0x31, 0x01, ..] => SourceFormat::OpenExr,
        _ => SourceFormat::Unknown,
    }
}

fn image_format(format: SourceFormat) -> Option<ImageFormat> {
    match format {
        SourceFormat::Png => Some(ImageFormat::Png),
        SourceFormat::Jpeg => Some(ImageFormat::Jpeg),
        SourceFormat::Gif => Some(ImageFormat::Gif),
        SourceFormat::Bmp => Some(ImageFormat::Bmp),
        SourceFormat::Tiff => Some(ImageFormat::Tiff),
        SourceFormat::WebP => Some(ImageFormat::WebP),
        SourceFormat::Avif => Some(ImageFormat::Avif),
        SourceFormat::Qoi => Some(ImageFormat::Qoi),
        SourceFormat::OpenExr => Some(ImageFormat::OpenExr),
        SourceFormat::Unknown => None,
    }
}

/// Decode raw bytes into an RGBA8 [`SourceImage`] under the default limits.
///
/// Fails without a partial result on empty input, unknown signatures,
/// formats without a compiled-in decoder, and corrupt data.
pub fn decode_image(bytes: &[u8]) -> Result<SourceImage, DecodeError> {
    decode_image_with_limits(bytes, Limits::default())
}

/// [`decode_image`] with explicit reader limits for the guessed path.
pub fn decode_image_with_limits(bytes: &[u8], limits: Limits) -> Result<SourceImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let format = sniff_format(bytes);
    match format {
        SourceFormat::Unknown => return Err(DecodeError::Unrecognized),
        SourceFormat::Avif => return Err(check_avif(bytes)),
        _ => {}
    }

    // `reading_enabled()` is false when the feature for this codec is off.
    if !image_format(format).is_some_and(|f| f.reading_enabled()) {
        return Err(DecodeError::Unsupported(format));
    }

    let decoded = match decode_guessed(bytes, limits) {
        Ok(img) => img,
        Err(primary) if format == SourceFormat::WebP => {
            tracing::debug!(error = %primary, "guessed decode failed, retrying as WebP container");
            decode_webp(bytes)?
        }
        Err(ImageError::Limits(e)) => {
            return Err(DecodeError::TooLarge {
                format,
                reason: e.to_string(),
            });
        }
        Err(e) => {
            return Err(DecodeError::Corrupt {
                format,
                reason: e.to_string(),
            });
        }
    };

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(DecodeError::Corrupt {
            format,
            reason: "decoded image has no pixels".into(),
        });
    }

    tracing::debug!(
        format = %format,
        width = decoded.width(),
        height = decoded.height(),
        "decoded source image"
    );

    Ok(SourceImage {
        pixels: decoded.into_rgba8(),
        format,
    })
}

fn decode_guessed(bytes: &[u8], limits: Limits) -> Result<DynamicImage, ImageError> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits);
    reader.decode()
}

/// Explicit WebP container decode; animations yield their first frame.
fn decode_webp(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    let corrupt = |e: ImageError| DecodeError::Corrupt {
        format: SourceFormat::WebP,
        reason: e.to_string(),
    };
    let decoder = WebPDecoder::new(Cursor::new(bytes)).map_err(corrupt)?;
    if decoder.has_animation() {
        let frame = decoder
            .into_frames()
            .next()
            .ok_or_else(|| DecodeError::Corrupt {
                format: SourceFormat::WebP,
                reason: "animation has no frames".into(),
            })?
            .map_err(corrupt)?;
        return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
    }
    DynamicImage::from_decoder(decoder).map_err(corrupt)
}

/// AVIF never decodes here; tell well-formed files apart from corrupt ones.
fn check_avif(bytes: &[u8]) -> DecodeError {
    match avif_parse::read_avif(&mut Cursor::new(bytes)) {
        Ok(_) => DecodeError::Unsupported(SourceFormat::Avif),
        Err(e) => DecodeError::Corrupt {
            format: SourceFormat::Avif,
            reason: format!("{e:?}"),
        },
    }
}
