//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Split / Batch
//!
//! ```text
//! icons.png (png 900x900, 3x3 grid, frame 3px)
//!     r0c0 → icons-r0c0.png (256x256, 1843 bytes)
//!     r0c1 → icons-r0c1.png (256x256, 1790 bytes, degraded)
//!     ...
//! Split 9 cells at 256x256 in 41 ms
//! ```
//!
//! ## Inspect
//!
//! ```text
//! icons.png (png 900x900, 3x3 grid)
//!     Sheet frame: 3px (top 3, right 3, bottom 3, left 3)
//!     r0c0 at (0,0) 298x298
//!         Frame: none
//!         Content: (49,49)-(249,249) 200x200
//!     r0c1 at (298,0) 298x298
//!         Frame: none
//!         Content: empty
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{BatchSummary, SheetManifest};
use crate::pipeline::{GridAnalysis, SplitEvent};
use crate::types::{ContentBounds, FrameTrim};

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Grid position label, e.g. `r1c2`.
fn cell_label(row: u32, col: u32) -> String {
    format!("r{row}c{col}")
}

fn format_bounds(bounds: Option<&ContentBounds>) -> String {
    match bounds {
        Some(b) => format!(
            "({},{})-({},{}) {}x{}",
            b.min_x,
            b.min_y,
            b.max_x,
            b.max_y,
            b.width(),
            b.height()
        ),
        None => "empty".to_string(),
    }
}

fn format_frame(applied: u32, edges: &FrameTrim) -> String {
    if applied == 0 && edges.is_empty() {
        return "none".to_string();
    }
    format!(
        "{}px (top {}, right {}, bottom {}, left {})",
        applied, edges.top, edges.right, edges.bottom, edges.left
    )
}

/// Sheet header: name, decoded format, dimensions and grid.
fn sheet_header(name: &str, analysis: &GridAnalysis, frame: bool) -> String {
    let mut header = format!(
        "{} ({} {}x{}, {} grid",
        name, analysis.source_format, analysis.source_width, analysis.source_height, analysis.grid
    );
    if frame && analysis.sheet_frame > 0 {
        header.push_str(&format!(", frame {}px", analysis.sheet_frame));
    }
    header.push(')');
    header
}

// ============================================================================
// Progress events
// ============================================================================

/// Format a single split progress event as display lines.
///
/// Events are shown at debug verbosity; cell-level success is quiet.
pub fn format_split_event(event: &SplitEvent) -> Vec<String> {
    match event {
        SplitEvent::Decoded {
            format,
            width,
            height,
        } => vec![format!("Decoded {format} {width}x{height}")],
        SplitEvent::SheetFrameStripped { thickness } => {
            vec![format!("{}Stripped {thickness}px sheet frame", indent(1))]
        }
        SplitEvent::CellAnalyzed {
            index,
            frame,
            bounds,
        } => {
            let mut line = format!("{}cell {index}: {}", indent(1), format_bounds(bounds.as_ref()));
            if *frame > 0 {
                line.push_str(&format!(", frame {frame}px"));
            }
            vec![line]
        }
        SplitEvent::CellDegraded { index, reason } => {
            vec![format!("{}cell {index}: degraded ({reason})", indent(1))]
        }
        SplitEvent::CellEncoded { index, bytes } => {
            vec![format!("{}cell {index}: {bytes} bytes", indent(1))]
        }
    }
}

// ============================================================================
// Split / Batch
// ============================================================================

/// Format one written sheet: header, one line per cell, and a total.
pub fn format_sheet_output(manifest: &SheetManifest) -> Vec<String> {
    let report = &manifest.report;
    let name = std::path::Path::new(&manifest.source)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| manifest.source.clone());

    let mut lines = vec![sheet_header(&name, &report.analysis, true)];
    for cell in &manifest.cells {
        let mut line = format!(
            "{}{} \u{2192} {} ({}x{}, {} bytes",
            indent(1),
            cell_label(cell.row, cell.col),
            cell.file,
            cell.width,
            cell.height,
            cell.bytes
        );
        if cell.degraded {
            line.push_str(", degraded");
        }
        line.push(')');
        lines.push(line);
    }
    lines.push(format!(
        "Split {} cells at {} in {} ms",
        manifest.cells.len(),
        report.target,
        report.timings.total().as_millis()
    ));
    lines
}

pub fn print_sheet_output(manifest: &SheetManifest) {
    for line in format_sheet_output(manifest) {
        println!("{}", line);
    }
}

/// Format a batch run: every sheet, then failures, then totals.
pub fn format_batch_output(summary: &BatchSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for manifest in &summary.sheets {
        lines.extend(format_sheet_output(manifest));
        lines.push(String::new());
    }
    if !summary.failed.is_empty() {
        lines.push("Failed".to_string());
        for (path, reason) in &summary.failed {
            lines.push(format!("{}{}: {}", indent(1), path.display(), reason));
        }
        lines.push(String::new());
    }
    let cells: usize = summary.sheets.iter().map(|s| s.cells.len()).sum();
    lines.push(format!(
        "Processed {} sheets ({} cells), {} failed",
        summary.sheets.len(),
        cells,
        summary.failed.len()
    ));
    lines
}

pub fn print_batch_output(summary: &BatchSummary) {
    for line in format_batch_output(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// Format the analysis of one sheet without rendering any cells.
pub fn format_analysis(name: &str, analysis: &GridAnalysis) -> Vec<String> {
    let mut lines = vec![sheet_header(name, analysis, false)];
    lines.push(format!(
        "{}Sheet frame: {}",
        indent(1),
        format_frame(analysis.sheet_frame, &analysis.sheet_frame_edges)
    ));
    for cell in &analysis.cells {
        let r = &cell.rect;
        lines.push(format!(
            "{}{} at ({},{}) {}x{}",
            indent(1),
            cell_label(r.row, r.col),
            r.x,
            r.y,
            r.width,
            r.height
        ));
        lines.push(format!(
            "{}Frame: {}",
            indent(2),
            format_frame(cell.frame, &cell.frame_edges)
        ));
        lines.push(format!(
            "{}Content: {}",
            indent(2),
            format_bounds(cell.bounds.as_ref())
        ));
        if cell.degraded {
            lines.push(format!("{}Degraded: analysis failed", indent(2)));
        }
    }
    lines
}

pub fn print_analysis(name: &str, analysis: &GridAnalysis) {
    for line in format_analysis(name, analysis) {
        println!("{}", line);
    }
}
