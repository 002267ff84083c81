//! Shared types passed between pipeline stages.
//!
//! Everything here is created and consumed within a single split call. None of
//! these values outlive the call that produced them, and none are shared
//! between concurrent calls.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Container format detected from the input's magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
    Avif,
    Qoi,
    OpenExr,
    Unknown,
}

impl SourceFormat {
    /// Lowercase name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            SourceFormat::Png => "png",
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Gif => "gif",
            SourceFormat::Bmp => "bmp",
            SourceFormat::Tiff => "tiff",
            SourceFormat::WebP => "webp",
            SourceFormat::Avif => "avif",
            SourceFormat::Qoi => "qoi",
            SourceFormat::OpenExr => "openexr",
            SourceFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded input image.
///
/// Pixels are always normalized to RGBA8 so every later stage can rely on an
/// alpha channel, whatever the source format carried.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: RgbaImage,
    pub format: SourceFormat,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Rectangle of one grid position.
///
/// [`resolve_cells`](crate::imaging::resolve_cells) measures it on the
/// frame-stripped sheet; analysis reports shift it back into source image
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub row: u32,
    pub col: u32,
}

impl CellRect {
    /// Row-major index of this cell within a grid of `cols` columns.
    pub fn index(&self, cols: u32) -> usize {
        (self.row * cols + self.col) as usize
    }
}

/// Tight box around the non-background pixels of a cell.
///
/// Coordinates are local to the cell; `max_x` and `max_y` are exclusive, so a
/// box is never empty when `min < max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl ContentBounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    /// True when the box is non-empty and lies inside a `width × height` area.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.min_x < self.max_x
            && self.min_y < self.max_y
            && self.max_x <= width
            && self.max_y <= height
    }
}

/// Pixels trimmed by frame detection, per edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTrim {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FrameTrim {
    /// Largest accepted thickness across the four edges.
    pub fn thickness(&self) -> u32 {
        self.top.max(self.right).max(self.bottom).max(self.left)
    }

    pub fn is_empty(&self) -> bool {
        self.thickness() == 0
    }
}

/// Encoded output for one grid position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCell {
    pub index: usize,
    pub row: u32,
    pub col: u32,
    pub width: u32,
    pub height: u32,
    pub format: crate::imaging::OutputFormat,
    pub bytes: Vec<u8>,
}
