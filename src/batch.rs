//! Filesystem side of the tool: finding sheets, naming and writing cells.
//!
//! The library pipeline never touches the disk. This module reads sheet files,
//! hands the bytes to [`split_grid_with_context`], writes every encoded cell
//! as `<stem>-r<row>c<col>.<ext>`, and records what it wrote in a
//! [`SheetManifest`] (with a SHA-256 digest per cell).
//!
//! ## Output Layout
//!
//! ```text
//! split:  <out>/<stem>-r0c0.png ...
//! batch:  <out>/<stem>/<stem>-r0c0.png ...
//! ```
//!
//! A sheet that fails in `batch` is logged and recorded in the summary; the
//! remaining sheets still run.

use crate::imaging::OutputFormat;
use crate::pipeline::{SplitContext, SplitError, SplitOptions, SplitReport, split_grid_with_context};
use crate::types::{ContentBounds, EncodedCell};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions picked up by directory discovery (lowercase).
pub const SHEET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff", "avif",
];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{path}: {source}")]
    Split {
        path: PathBuf,
        #[source]
        source: SplitError,
    },
    #[error("{0} has no usable file stem")]
    NoStem(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BatchError + '_ {
    move |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One written cell, as listed in the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestCell {
    pub index: usize,
    pub row: u32,
    pub col: u32,
    /// Output path, relative to the output directory.
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub sha256: String,
    /// Frame pixels stripped from each side of the cell.
    pub frame: u32,
    /// Content box in cell-local coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<ContentBounds>,
    pub degraded: bool,
}

/// Everything written for one sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetManifest {
    pub source: String,
    pub output_dir: String,
    pub report: SplitReport,
    pub cells: Vec<ManifestCell>,
}

/// Outcome of a `batch` run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub sheets: Vec<SheetManifest>,
    pub failed: Vec<(PathBuf, String)>,
}

/// File name for one cell: `<stem>-r<row>c<col>.<ext>`.
pub fn cell_file_name(stem: &str, row: u32, col: u32, format: OutputFormat) -> String {
    format!("{stem}-r{row}c{col}.{}", format.extension())
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn has_sheet_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SHEET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Find sheet images under `root`, sorted by path.
///
/// A plain file is returned as-is. Hidden files and directories are skipped.
pub fn discover_sheets(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && has_sheet_extension(entry.path()) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

fn file_stem(path: &Path) -> Result<String, BatchError> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BatchError::NoStem(path.to_path_buf()))
}

/// Write every cell into `out_dir` and build the manifest.
pub fn write_cells(
    source: &Path,
    out_dir: &Path,
    cells: &[EncodedCell],
    report: SplitReport,
) -> Result<SheetManifest, BatchError> {
    let stem = file_stem(source)?;
    fs::create_dir_all(out_dir).map_err(io_error(out_dir))?;

    let mut written = Vec::with_capacity(cells.len());
    for cell in cells {
        let name = cell_file_name(&stem, cell.row, cell.col, cell.format);
        let path = out_dir.join(&name);
        fs::write(&path, &cell.bytes).map_err(io_error(&path))?;
        let analysis = report.analysis.cells.get(cell.index);
        written.push(ManifestCell {
            index: cell.index,
            row: cell.row,
            col: cell.col,
            file: name,
            width: cell.width,
            height: cell.height,
            bytes: cell.bytes.len(),
            sha256: sha256_hex(&cell.bytes),
            frame: analysis.map_or(0, |a| a.frame),
            bounds: analysis.and_then(|a| a.bounds),
            degraded: analysis.is_some_and(|a| a.degraded),
        });
    }
    tracing::debug!(source = %source.display(), cells = written.len(), "cells written");

    Ok(SheetManifest {
        source: source.display().to_string(),
        output_dir: out_dir.display().to_string(),
        report,
        cells: written,
    })
}

/// Read, split and write one sheet.
pub fn split_file(
    path: &Path,
    out_dir: &Path,
    options: &SplitOptions,
    ctx: &SplitContext,
) -> Result<SheetManifest, BatchError> {
    let bytes = fs::read(path).map_err(io_error(path))?;
    let output = split_grid_with_context(&bytes, options, ctx).map_err(|source| {
        BatchError::Split {
            path: path.to_path_buf(),
            source,
        }
    })?;
    write_cells(path, out_dir, &output.cells, output.report)
}

/// Split every sheet under `root`, one output directory per sheet.
///
/// Sheets run one after another; each sheet's cells run in parallel.
/// `make_ctx` builds the per-sheet context from the sheet path.
pub fn run_batch(
    root: &Path,
    out_root: &Path,
    options: &SplitOptions,
    make_ctx: impl Fn(&Path) -> SplitContext,
) -> Result<BatchSummary, BatchError> {
    let sheets = discover_sheets(root)?;
    tracing::info!(root = %root.display(), sheets = sheets.len(), "batch discovered sheets");

    let mut summary = BatchSummary::default();
    for path in sheets {
        let result =
            file_stem(&path).and_then(|stem| {
                split_file(&path, &out_root.join(stem), options, &make_ctx(&path))
            });
        match result {
            Ok(manifest) => summary.sheets.push(manifest),
            Err(e) => {
                tracing::warn!(sheet = %path.display(), error = %e, "sheet skipped");
                summary.failed.push((path, e.to_string()));
            }
        }
    }
    Ok(summary)
}
