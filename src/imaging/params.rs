//! Parameter types for grid operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`config`](crate::config) (which loads user settings)
//! and the pixel stages under [`imaging`](super), and they serialize straight
//! into `gridcut.toml`.
//!
//! ## Types
//!
//! - [`GridSpec`]: rows × columns of the composite sheet.
//! - [`TargetSize`]: explicit output cell size, when the caller wants one.
//! - [`FitPolicy`]: contain (fit-and-center) or cover (fill-and-crop).
//! - [`GridPolicy`]: even split or legacy separator scan.
//! - [`OutputFormat`]: lossless encoding for the output cells.
//! - [`FrameSettings`] / [`BackgroundSettings`]: pixel heuristics thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted value for either grid axis.
pub const MAX_GRID_AXIS: u32 = 16;

/// Hard ceiling on frame thickness. Anything thicker is artwork.
pub const MAX_FRAME_THICKNESS: u32 = 5;

/// Widest or tallest cell the lossless WebP encoder accepts.
pub const MAX_WEBP_SIDE: u32 = 16384;

/// Largest output cell area, in pixels (256 MiB of RGBA).
pub const MAX_TARGET_PIXELS: u64 = 1 << 26;

/// Rows × columns of a composite sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSpec {
    pub rows: u32,
    pub cols: u32,
}

impl GridSpec {
    /// Nine icons, 3×3.
    pub const ICONS: GridSpec = GridSpec { rows: 3, cols: 3 };
    /// Four illustrations, 2×2.
    pub const ILLUSTRATIONS: GridSpec = GridSpec { rows: 2, cols: 2 };

    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn cell_count(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    pub fn is_valid(&self) -> bool {
        (1..=MAX_GRID_AXIS).contains(&self.rows) && (1..=MAX_GRID_AXIS).contains(&self.cols)
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::ICONS
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Explicit output size for every cell in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    /// True when a cell of this size can be allocated and written as `format`.
    pub fn is_encodable(&self, format: OutputFormat) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        if u64::from(self.width) * u64::from(self.height) > MAX_TARGET_PIXELS {
            return false;
        }
        match format {
            OutputFormat::Png => true,
            OutputFormat::WebP => self.width <= MAX_WEBP_SIDE && self.height <= MAX_WEBP_SIDE,
        }
    }
}

impl FromStr for TargetSize {
    type Err = String;

    /// Parses `WxH`, e.g. `512x512`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
        if width == 0 || height == 0 {
            return Err("target size must be non-zero".into());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How content is fitted into the uniform output size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Scale to fit inside, center on a transparent canvas. Never crops.
    #[default]
    Contain,
    /// Scale to cover, center-crop the overflow. Never pads.
    Cover,
}

/// How cell rectangles are derived from the sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridPolicy {
    /// Exact even split, remainder to the last row/column.
    #[default]
    Even,
    /// Cut on blank separator bands; falls back to even per axis.
    Separators,
}

/// Lossless output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    WebP,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

/// Where per-cell work runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoolStrategy {
    /// A fresh pool per call, dropped when the call returns.
    #[default]
    PerCall,
    /// rayon's global pool, shared by every call in the process.
    Shared,
}

/// Thresholds for frame artifact detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameSettings {
    /// Strip a frame around the whole sheet before splitting.
    pub whole_image: bool,
    /// Strip a frame around each cell after splitting.
    pub per_cell: bool,
    /// Thickest frame accepted, in pixels (1–5).
    pub max_thickness: u32,
    /// Minimum fraction of solid samples at every thickness.
    pub solid_ratio: f32,
    /// Alpha above this counts as solid.
    pub alpha_threshold: u8,
    /// Approximate samples taken along each edge.
    pub samples_per_edge: u32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            whole_image: true,
            per_cell: true,
            max_thickness: MAX_FRAME_THICKNESS,
            solid_ratio: 0.8,
            alpha_threshold: 10,
            samples_per_edge: 50,
        }
    }
}

/// What counts as canvas rather than artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundSettings {
    /// Alpha below this is transparent background.
    pub alpha_threshold: u8,
    /// R, G and B all above this is near-white background.
    pub white_threshold: u8,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            alpha_threshold: 10,
            white_threshold: 245,
        }
    }
}

impl BackgroundSettings {
    #[inline]
    pub fn is_background(&self, px: &image::Rgba<u8>) -> bool {
        let [r, g, b, a] = px.0;
        a < self.alpha_threshold
            || (r > self.white_threshold && g > self.white_threshold && b > self.white_threshold)
    }
}
