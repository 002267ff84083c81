//! Configuration module.
//!
//! Handles loading, validating, and merging `gridcut.toml`. Stock defaults are
//! the base layer; a user file overrides just the keys it names; command-line
//! flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [grid]
//! rows = 3
//! cols = 3
//! policy = "even"           # "even" | "separators"
//!
//! [output]
//! fit = "contain"           # "contain" | "cover"
//! format = "png"            # "png" | "webp"
//! # width = 512             # fixed cell size; both or neither
//! # height = 512
//!
//! [frame]
//! whole_image = true
//! per_cell = true
//! max_thickness = 5         # 1-5
//! solid_ratio = 0.8
//! alpha_threshold = 10
//! samples_per_edge = 50
//!
//! [background]
//! alpha_threshold = 10      # alpha below this is background
//! white_threshold = 245     # r, g, b all above this is background
//!
//! [processing]
//! # max_workers = 4         # omit for one worker per cell
//! pool = "per-call"         # "per-call" | "shared"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::params::{
    BackgroundSettings, FitPolicy, FrameSettings, GridPolicy, MAX_FRAME_THICKNESS, MAX_GRID_AXIS,
    OutputFormat, PoolStrategy, TargetSize,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `gridcut.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridcutConfig {
    /// Sheet layout and cell resolution policy.
    pub grid: GridConfig,
    /// Output size, fit policy and encoding.
    pub output: OutputConfig,
    /// Frame artifact detection thresholds.
    pub frame: FrameSettings,
    /// Background predicate for content bounds.
    pub background: BackgroundSettings,
    /// Worker pool settings.
    pub processing: ProcessingConfig,
}

impl GridcutConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let axis = 1..=MAX_GRID_AXIS;
        if !axis.contains(&self.grid.rows) || !axis.contains(&self.grid.cols) {
            return Err(ConfigError::Validation(format!(
                "grid.rows and grid.cols must be 1-{MAX_GRID_AXIS}"
            )));
        }
        match (self.output.width, self.output.height) {
            (Some(0), _) | (_, Some(0)) => {
                return Err(ConfigError::Validation(
                    "output.width and output.height must be non-zero".into(),
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::Validation(
                    "output.width and output.height must be set together".into(),
                ));
            }
            _ => {}
        }
        match self.output.size() {
            Some(size) if !size.is_encodable(self.output.format) => {
                return Err(ConfigError::Validation(format!(
                    "output size {size} is too large for {} output",
                    self.output.format.extension()
                )));
            }
            _ => {}
        }
        if !(1..=MAX_FRAME_THICKNESS).contains(&self.frame.max_thickness) {
            return Err(ConfigError::Validation(format!(
                "frame.max_thickness must be 1-{MAX_FRAME_THICKNESS}"
            )));
        }
        if !(0.0..=1.0).contains(&self.frame.solid_ratio) || self.frame.solid_ratio == 0.0 {
            return Err(ConfigError::Validation(
                "frame.solid_ratio must be in (0, 1]".into(),
            ));
        }
        if self.frame.samples_per_edge == 0 {
            return Err(ConfigError::Validation(
                "frame.samples_per_edge must be non-zero".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Sheet layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    /// How cell rectangles are resolved.
    pub policy: GridPolicy,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            policy: GridPolicy::default(),
        }
    }
}

/// Output cell settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Fit policy for the uniform output size.
    pub fit: FitPolicy,
    /// Lossless encoding of each cell.
    pub format: OutputFormat,
    /// Fixed cell width. Omit (with `height`) to derive from content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Fixed cell height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl OutputConfig {
    /// The fixed target size, when both dimensions are set.
    pub fn size(&self) -> Option<TargetSize> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(TargetSize { width, height }),
            _ => None,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum parallel cell workers. When absent, one per cell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    /// Per-call pool or rayon's shared global pool.
    pub pool: PoolStrategy,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GridcutConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<GridcutConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GridcutConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<GridcutConfig, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `gridcut.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# gridcut configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Sheet layout
# ---------------------------------------------------------------------------
[grid]
# 3x3 for icon sheets, 2x2 for illustration sheets. Each axis 1-16.
rows = 3
cols = 3

# "even": exact even split, last row/column takes the remainder.
# "separators": cut on blank gutters; falls back to even per axis.
policy = "even"

# ---------------------------------------------------------------------------
# Output cells
# ---------------------------------------------------------------------------
[output]
# "contain": whole content, centred, transparent padding (icons).
# "cover": fills the cell, overflow cropped, no padding (illustrations).
fit = "contain"

# Lossless encoding: "png" or "webp".
format = "png"

# Fixed cell size. Leave both unset to use the largest content in the sheet.
# width = 512
# height = 512

# ---------------------------------------------------------------------------
# Frame artifacts (thin solid borders painted by the generator)
# ---------------------------------------------------------------------------
[frame]
whole_image = true
per_cell = true

# Thickest border treated as an artifact, 1-5 px. Thicker is artwork.
max_thickness = 5

# Fraction of edge samples that must be solid at every thickness.
solid_ratio = 0.8

# Alpha above this counts as solid.
alpha_threshold = 10

# Approximate samples taken along each edge.
samples_per_edge = 50

# ---------------------------------------------------------------------------
# Background (what content-bound trimming ignores)
# ---------------------------------------------------------------------------
[background]
alpha_threshold = 10
white_threshold = 245

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel cell workers. Omit for one worker per cell.
# max_workers = 4

# "per-call": fresh pool per sheet. "shared": rayon's global pool.
pool = "per-call"
"##
}
