//! # gridcut
//!
//! Splits AI-generated image sheets (a 3×3 grid of icons, a 2×2 grid of
//! illustrations) into individual, uniformly sized cells. Generators paint
//! thin frames around sheets and cells and pad every subject differently; this
//! crate strips those artifacts, trims each cell to its content, and renders
//! every cell at one shared size.
//!
//! # Architecture: Decode, Analyze, Render
//!
//! ```text
//! 1. Decode    bytes   →  RGBA sheet       (format sniff, strip sheet frame)
//! 2. Analyze   sheet   →  cells + bounds   (per cell, in parallel)
//! 3. Render    cells   →  encoded cells    (per cell, in parallel, uniform size)
//! ```
//!
//! Rendering needs the largest content box in the sheet, so analysis finishes
//! for every cell before rendering starts. The library is pure: bytes in,
//! bytes out. Reading and writing files is the job of [`batch`] and the CLI.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Entry points [`split_grid`] and [`analyze_grid`]; worker pool, failure policy |
//! | [`imaging`] | Pixel stages: decode, frame strip, grid, bounds, normalize, encode |
//! | [`types`] | Shared value types (`CellRect`, `ContentBounds`, `EncodedCell`) |
//! | [`config`] | `gridcut.toml` loading, merging over stock defaults, validation |
//! | [`batch`] | Sheet discovery, cell file naming, writing cells and manifests |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Degrade Per Cell, Fail Per Sheet
//!
//! A sheet that cannot be decoded produces an error and nothing else. A cell
//! whose analysis goes wrong never takes the sheet down: it is rendered from
//! its raw sub-image and flagged in the report. Callers always get exactly
//! `rows × cols` cells or an error.
//!
//! ## Frames Versus Padding
//!
//! A frame is a thin border of visible, non-white pixels along an edge. White
//! or transparent margins are padding and are left to content-bound trimming.
//! Anything thicker than 5px is treated as artwork.
//!
//! ## No Shared State Between Calls
//!
//! Every call builds its own worker pool (unless configured to share rayon's
//! global pool) and carries its label and progress channel in an explicit
//! [`pipeline::SplitContext`]. Stage timings come back in the report.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod types;

pub use pipeline::{
    SplitContext, SplitError, SplitEvent, SplitOptions, SplitOutput, SplitReport, analyze_grid,
    split_grid, split_grid_with_context,
};

#[cfg(test)]
pub(crate) mod test_helpers;
