//! Shared test utilities for the gridcut test suite.
//!
//! Builders for synthetic sheets: solid canvases, rectangles, borders, and
//! in-memory encoders so decode tests never touch the filesystem.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut sheet = solid_canvas(600, 600, WHITE);
//! draw_border(&mut sheet, 3, BLACK);
//! let bytes = encode_png(&sheet);
//! ```

use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const BLACK: [u8; 4] = [0, 0, 0, 255];

// =========================================================================
// Canvas builders
// =========================================================================

/// A `w × h` image filled with one color.
pub fn solid_canvas(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba(color))
}

/// Fill a rectangle, clipped to the image.
pub fn fill_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 4]) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, Rgba(color));
        }
    }
}

/// Paint a border of `thickness` pixels around the whole image.
pub fn draw_border(img: &mut RgbaImage, thickness: u32, color: [u8; 4]) {
    let (w, h) = img.dimensions();
    fill_rect(img, 0, 0, w, thickness, color);
    fill_rect(img, 0, h.saturating_sub(thickness), w, thickness, color);
    fill_rect(img, 0, 0, thickness, h, color);
    fill_rect(img, w.saturating_sub(thickness), 0, thickness, h, color);
}

/// A sheet with one centred square of `color` in every cell of a rows×cols grid.
///
/// Square side is `side_pct` percent of the smaller cell dimension.
pub fn icon_sheet(w: u32, h: u32, rows: u32, cols: u32, side_pct: u32) -> RgbaImage {
    let mut img = solid_canvas(w, h, WHITE);
    let (cw, ch) = (w / cols, h / rows);
    let side = cw.min(ch) * side_pct / 100;
    for r in 0..rows {
        for c in 0..cols {
            let color = [(40 * r + 20) as u8, (40 * c + 20) as u8, 128, 255];
            let x = c * cw + (cw - side) / 2;
            let y = r * ch + (ch - side) / 2;
            fill_rect(&mut img, x, y, side, side, color);
        }
    }
    img
}

// =========================================================================
// In-memory encoders
// =========================================================================

pub fn encode_png(img: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn encode_webp(img: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .unwrap();
    out
}

/// Decode an encoded cell back to pixels.
pub fn decode_rgba(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().into_rgba8()
}
