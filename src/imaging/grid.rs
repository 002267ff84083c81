//! Cell rectangle resolution.
//!
//! The default policy is an exact even split: generators cannot be trusted to
//! paint pixel-exact separator lines, and faint grid texture over the whole
//! canvas defeats line detection. The separator scan survives as an opt-in
//! policy for sheets with irregular spacing. It works per axis and drops back
//! to the even split for any axis where a cut cannot be located.

use super::calculations::even_spans;
use super::params::{BackgroundSettings, GridPolicy, GridSpec};
use crate::types::CellRect;
use image::RgbaImage;

/// Fraction of a line that must be background for it to count as separator.
const SEPARATOR_BLANK_RATIO: f32 = 0.98;

/// Resolve the cell rectangles of `image` in row-major order.
///
/// The caller guarantees `grid` is valid and that the image has at least one
/// pixel per cell on each axis.
pub fn resolve_cells(
    image: &RgbaImage,
    grid: GridSpec,
    policy: GridPolicy,
    background: &BackgroundSettings,
) -> Vec<CellRect> {
    let (w, h) = image.dimensions();
    let (col_spans, row_spans) = match policy {
        GridPolicy::Even => (even_spans(w, grid.cols), even_spans(h, grid.rows)),
        GridPolicy::Separators => {
            let blank_cols = blank_lines(image, Axis::Vertical, background);
            let blank_rows = blank_lines(image, Axis::Horizontal, background);
            (
                separator_spans(&blank_cols, grid.cols).unwrap_or_else(|| {
                    tracing::debug!("no vertical separators found, using even split");
                    even_spans(w, grid.cols)
                }),
                separator_spans(&blank_rows, grid.rows).unwrap_or_else(|| {
                    tracing::debug!("no horizontal separators found, using even split");
                    even_spans(h, grid.rows)
                }),
            )
        }
    };
    build_cells(&col_spans, &row_spans)
}

fn build_cells(col_spans: &[(u32, u32)], row_spans: &[(u32, u32)]) -> Vec<CellRect> {
    let mut cells = Vec::with_capacity(col_spans.len() * row_spans.len());
    for (row, &(y, height)) in row_spans.iter().enumerate() {
        for (col, &(x, width)) in col_spans.iter().enumerate() {
            cells.push(CellRect {
                x,
                y,
                width,
                height,
                row: row as u32,
                col: col as u32,
            });
        }
    }
    cells
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    /// One entry per column.
    Vertical,
    /// One entry per row.
    Horizontal,
}

/// For each column (or row), whether it is almost entirely background.
fn blank_lines(image: &RgbaImage, axis: Axis, background: &BackgroundSettings) -> Vec<bool> {
    let (w, h) = image.dimensions();
    let (count, len) = match axis {
        Axis::Vertical => (w, h),
        Axis::Horizontal => (h, w),
    };
    (0..count)
        .map(|i| {
            let blank = (0..len)
                .filter(|&j| {
                    let px = match axis {
                        Axis::Vertical => image.get_pixel(i, j),
                        Axis::Horizontal => image.get_pixel(j, i),
                    };
                    background.is_background(px)
                })
                .count();
            blank as f32 >= SEPARATOR_BLANK_RATIO * len as f32
        })
        .collect()
}

/// Maximal runs of consecutive `true` entries as `(start, end_exclusive)`.
fn blank_runs(lines: &[bool]) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &blank) in lines.iter().enumerate() {
        match (blank, start) {
            (true, None) => start = Some(i as u32),
            (false, Some(s)) => {
                runs.push((s, i as u32));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, lines.len() as u32));
    }
    runs
}

/// Cut an axis of `lines.len()` pixels into `parts` spans at separator bands.
///
/// Each expected cut `k * len / parts` snaps to the centre of the nearest
/// interior blank run within a quarter cell. Returns `None` when any cut has
/// no candidate or the cuts would not be strictly increasing.
fn separator_spans(lines: &[bool], parts: u32) -> Option<Vec<(u32, u32)>> {
    let len = lines.len() as u32;
    if parts <= 1 {
        return Some(vec![(0, len)]);
    }
    let runs: Vec<(u32, u32)> = blank_runs(lines)
        .into_iter()
        .filter(|&(s, e)| s > 0 && e < len)
        .collect();
    let tolerance = (len / parts / 4).max(1);

    let mut cuts = Vec::with_capacity(parts as usize + 1);
    cuts.push(0u32);
    for k in 1..parts {
        let expected = (k as u64 * len as u64 / parts as u64) as u32;
        let cut = runs
            .iter()
            .map(|&(s, e)| (s + e) / 2)
            .filter(|&c| c.abs_diff(expected) <= tolerance)
            .min_by_key(|&c| c.abs_diff(expected))?;
        if cut <= *cuts.last()? {
            return None;
        }
        cuts.push(cut);
    }
    cuts.push(len);

    Some(cuts.windows(2).map(|w| (w[0], w[1] - w[0])).collect())
}
