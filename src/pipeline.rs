//! Grid decomposition: one encoded sheet in, `rows × cols` encoded cells out.
//!
//! ## Stages
//!
//! ```text
//! caller thread          decode → strip sheet frame → resolve cells → copy cells
//! worker pool  (barrier) per cell: strip cell frame → content bounds → crop
//! caller thread          derive batch target size
//! worker pool  (barrier) per cell: normalize → encode
//! caller thread          reassemble in row-major order
//! ```
//!
//! The derived target size needs every cell's content size, hence two
//! fan-outs. With an explicit target the second barrier costs nothing extra.
//!
//! ## Failure Policy
//!
//! Decode problems and invalid requests abort the call with a [`SplitError`]
//! and produce nothing. Target sizes the encoder cannot write are invalid
//! requests, checked before any cell work starts. A problem confined to one
//! cell never aborts the call: a failed encode or a panic inside that cell's
//! analysis or render is logged, and the cell is rendered from its raw
//! sub-image instead, so a successful call always returns exactly
//! `rows * cols` cells. Only a failure of that last fallback is fatal.
//!
//! ## Parallel Processing
//!
//! Cells run on a [rayon](https://docs.rs/rayon) pool sized to the cell count
//! (capped by `max_workers`). By default the pool is built per call and
//! dropped on return, so concurrent calls never share workers or buffers.
//! Every task owns its own copy of its cell's pixels.

use crate::config::GridcutConfig;
use crate::imaging::{
    BackgroundSettings, DecodeError, EncodeError, FitPolicy, FrameSettings, GridPolicy, GridSpec,
    OutputFormat, PoolStrategy, TargetSize, crop_to_bounds, decode_image, derive_batch_target,
    encode_cell, normalize_cell, resolve_cells, scan_content_bounds, strip_frame,
};
use crate::types::{CellRect, ContentBounds, EncodedCell, FrameTrim, SourceFormat};
use image::RgbaImage;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("invalid grid {0}: rows and cols must be 1-16")]
    InvalidGrid(GridSpec),
    #[error("invalid target size {0}")]
    InvalidTarget(TargetSize),
    #[error("image {width}x{height} is too small for a {grid} grid")]
    ImageTooSmall {
        width: u32,
        height: u32,
        grid: GridSpec,
    },
    #[error("could not start cell workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("cell {index} could not be encoded: {source}")]
    Encode {
        index: usize,
        #[source]
        source: EncodeError,
    },
    #[error("cell {index} panicked while rendering: {message}")]
    CellPanicked { index: usize, message: String },
}

/// Problems confined to one cell. Logged, never returned.
#[derive(Error, Debug)]
enum CellError {
    #[error("cell stage panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl CellError {
    fn into_split_error(self, index: usize) -> SplitError {
        match self {
            CellError::Panicked(message) => SplitError::CellPanicked { index, message },
            CellError::Encode(source) => SplitError::Encode { index, source },
        }
    }
}

/// Everything one split call needs besides the input bytes.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub grid: GridSpec,
    /// Fixed output cell size. `None` derives it from the batch's content.
    pub target: Option<TargetSize>,
    pub fit: FitPolicy,
    pub grid_policy: GridPolicy,
    pub frame: FrameSettings,
    pub background: BackgroundSettings,
    pub output_format: OutputFormat,
    /// Upper bound on cell workers. `None` means one per cell.
    pub max_workers: Option<usize>,
    pub pool: PoolStrategy,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self::from_config(&GridcutConfig::default())
    }
}

impl SplitOptions {
    /// Build options from loaded configuration values.
    pub fn from_config(config: &GridcutConfig) -> Self {
        Self {
            grid: GridSpec::new(config.grid.rows, config.grid.cols),
            target: config.output.size(),
            fit: config.output.fit,
            grid_policy: config.grid.policy,
            frame: config.frame,
            background: config.background,
            output_format: config.output.format,
            max_workers: config.processing.max_workers,
            pool: config.processing.pool,
        }
    }

    fn validate(&self) -> Result<(), SplitError> {
        if !self.grid.is_valid() {
            return Err(SplitError::InvalidGrid(self.grid));
        }
        match self.target {
            Some(t) if !t.is_encodable(self.output_format) => Err(SplitError::InvalidTarget(t)),
            _ => Ok(()),
        }
    }
}

/// Progress reported while a split runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitEvent {
    Decoded {
        format: SourceFormat,
        width: u32,
        height: u32,
    },
    SheetFrameStripped {
        thickness: u32,
    },
    CellAnalyzed {
        index: usize,
        frame: u32,
        bounds: Option<ContentBounds>,
    },
    CellDegraded {
        index: usize,
        reason: String,
    },
    CellEncoded {
        index: usize,
        bytes: usize,
    },
}

/// Per-call context, passed explicitly through every stage.
///
/// Carries the label used in log lines and an optional progress channel.
/// Nothing in here outlives or leaks between calls.
#[derive(Debug, Clone, Default)]
pub struct SplitContext {
    pub label: String,
    events: Option<Sender<SplitEvent>>,
    #[cfg(test)]
    fault: Option<(usize, FaultStage)>,
}

impl SplitContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Sender<SplitEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: SplitEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    /// Make the first attempt at `stage` panic for cell `index`.
    #[cfg(test)]
    fn with_fault(mut self, index: usize, stage: FaultStage) -> Self {
        self.fault = Some((index, stage));
        self
    }

    #[cfg(test)]
    fn check_fault(&self, index: usize, stage: FaultStage) {
        if self.fault == Some((index, stage)) {
            panic!("injected {stage:?} failure in cell {index}");
        }
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultStage {
    Analyze,
    Render,
}

/// What the analysis stages found for one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellAnalysis {
    pub index: usize,
    /// Cell rectangle in source image coordinates, sheet frame included.
    pub rect: CellRect,
    /// Pixels stripped from each side of the cell by frame detection.
    pub frame: u32,
    /// Per-edge frame measurement before stripping.
    pub frame_edges: FrameTrim,
    /// Content box in cell-local coordinates; `None` for an empty cell.
    pub bounds: Option<ContentBounds>,
    /// True when the cell fell back to its raw sub-image.
    pub degraded: bool,
}

/// Sheet-level findings, without normalized pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridAnalysis {
    pub source_format: SourceFormat,
    pub source_width: u32,
    pub source_height: u32,
    /// Per-edge frame measurement of the whole sheet.
    pub sheet_frame_edges: FrameTrim,
    /// Pixels stripped from each side of the sheet.
    pub sheet_frame: u32,
    pub grid: GridSpec,
    pub cells: Vec<CellAnalysis>,
}

/// Wall-clock time spent per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub decode: Duration,
    pub sheet_frame: Duration,
    pub grid: Duration,
    pub analyze: Duration,
    pub render: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.decode + self.sheet_frame + self.grid + self.analyze + self.render
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub label: String,
    pub analysis: GridAnalysis,
    pub target: TargetSize,
    pub timings: StageTimings,
}

impl SplitReport {
    pub fn degraded_cells(&self) -> Vec<usize> {
        self.analysis
            .cells
            .iter()
            .filter(|c| c.degraded)
            .map(|c| c.index)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub cells: Vec<EncodedCell>,
    pub report: SplitReport,
}

/// Split an encoded sheet into encoded cells, row-major.
pub fn split_grid(bytes: &[u8], options: &SplitOptions) -> Result<Vec<EncodedCell>, SplitError> {
    split_grid_with_context(bytes, options, &SplitContext::default()).map(|out| out.cells)
}

/// [`split_grid`] with an explicit context; also returns the full report.
pub fn split_grid_with_context(
    bytes: &[u8],
    options: &SplitOptions,
    ctx: &SplitContext,
) -> Result<SplitOutput, SplitError> {
    tracing::info!(label = %ctx.label, grid = %options.grid, "splitting sheet");
    let Prepared {
        mut analysis,
        cells,
        pool,
        mut timings,
    } = prepare(bytes, options, ctx)?;

    let content_sizes: Vec<Option<(u32, u32)>> = cells
        .iter()
        .map(|c| c.content.as_ref().map(|img| img.dimensions()))
        .collect();
    let raw_sizes: Vec<(u32, u32)> = cells.iter().map(|c| c.stripped.dimensions()).collect();
    let target = derive_batch_target(options.target, &content_sizes, &raw_sizes);
    if !target.is_encodable(options.output_format) {
        return Err(SplitError::InvalidTarget(target));
    }
    // Derived targets never enlarge content beyond its native size.
    let allow_upscale = options.target.is_some();
    tracing::debug!(label = %ctx.label, %target, "batch target size");

    let started = Instant::now();
    let rendered: Vec<Result<(EncodedCell, bool), SplitError>> = on_pool(pool.as_ref(), || {
        cells
            .into_par_iter()
            .map(|cell| render_cell(cell, target, allow_upscale, options, ctx))
            .collect()
    });
    timings.render = started.elapsed();

    let count = options.grid.cell_count();
    let mut slots: Vec<Option<EncodedCell>> = vec![None; count];
    for result in rendered {
        let (cell, degraded) = result?;
        if degraded {
            analysis.cells[cell.index].degraded = true;
        }
        let index = cell.index;
        slots[index] = Some(cell);
    }
    let cells: Vec<EncodedCell> = slots.into_iter().flatten().collect();
    debug_assert_eq!(cells.len(), count);

    tracing::info!(
        label = %ctx.label,
        cells = cells.len(),
        elapsed_ms = timings.total().as_millis() as u64,
        "sheet split"
    );

    Ok(SplitOutput {
        cells,
        report: SplitReport {
            label: ctx.label.clone(),
            analysis,
            target,
            timings,
        },
    })
}

/// Run decode, frame and bounds detection only.
pub fn analyze_grid(
    bytes: &[u8],
    options: &SplitOptions,
    ctx: &SplitContext,
) -> Result<GridAnalysis, SplitError> {
    prepare(bytes, options, ctx).map(|p| p.analysis)
}

/// A cell after the analysis fan-out, owning its pixels.
struct PreparedCell {
    index: usize,
    rect: CellRect,
    /// Exact sub-image of the sheet.
    raw: RgbaImage,
    /// `raw` minus any cell frame; what an empty cell is rendered from.
    stripped: RgbaImage,
    /// Content crop, `None` for an empty cell.
    content: Option<RgbaImage>,
}

struct Prepared {
    analysis: GridAnalysis,
    cells: Vec<PreparedCell>,
    pool: Option<ThreadPool>,
    timings: StageTimings,
}

fn prepare(bytes: &[u8], options: &SplitOptions, ctx: &SplitContext) -> Result<Prepared, SplitError> {
    options.validate()?;
    let mut timings = StageTimings::default();

    let started = Instant::now();
    let source = decode_image(bytes)?;
    timings.decode = started.elapsed();
    ctx.emit(SplitEvent::Decoded {
        format: source.format,
        width: source.width(),
        height: source.height(),
    });

    let started = Instant::now();
    let (source_format, source_width, source_height) =
        (source.format, source.width(), source.height());
    let (sheet_frame_edges, sheet, sheet_frame) = if options.frame.whole_image {
        let (sheet, edges, applied) =
            strip_frame(source.pixels, &options.frame, &options.background);
        (edges, sheet, applied)
    } else {
        (FrameTrim::default(), source.pixels, 0)
    };
    timings.sheet_frame = started.elapsed();
    if sheet_frame > 0 {
        tracing::debug!(label = %ctx.label, thickness = sheet_frame, "stripped sheet frame");
        ctx.emit(SplitEvent::SheetFrameStripped {
            thickness: sheet_frame,
        });
    }

    let grid = options.grid;
    let (w, h) = sheet.dimensions();
    if w < grid.cols || h < grid.rows {
        return Err(SplitError::ImageTooSmall {
            width: w,
            height: h,
            grid,
        });
    }

    let started = Instant::now();
    let rects = resolve_cells(&sheet, grid, options.grid_policy, &options.background);
    // Copy-on-fan-out: each task gets an independently allocated buffer.
    let jobs: Vec<(usize, CellRect, RgbaImage)> = rects
        .into_iter()
        .map(|rect| {
            let pixels =
                image::imageops::crop_imm(&sheet, rect.x, rect.y, rect.width, rect.height)
                    .to_image();
            // Reported in source coordinates, past the stripped sheet frame.
            let source_rect = CellRect {
                x: rect.x + sheet_frame,
                y: rect.y + sheet_frame,
                ..rect
            };
            (rect.index(grid.cols), source_rect, pixels)
        })
        .collect();
    drop(sheet);
    timings.grid = started.elapsed();

    let pool = build_pool(options, jobs.len())?;

    let started = Instant::now();
    let analyzed: Vec<(PreparedCell, CellAnalysis)> = on_pool(pool.as_ref(), || {
        jobs.into_par_iter()
            .map(|(index, rect, raw)| {
                let attempt = guarded(|| {
                    #[cfg(test)]
                    ctx.check_fault(index, FaultStage::Analyze);
                    Ok(analyze_cell(index, rect, &raw, options))
                });
                match attempt {
                    Ok((stripped, content, analysis)) => {
                        ctx.emit(SplitEvent::CellAnalyzed {
                            index,
                            frame: analysis.frame,
                            bounds: analysis.bounds,
                        });
                        let cell = PreparedCell {
                            index,
                            rect,
                            raw,
                            stripped,
                            content,
                        };
                        (cell, analysis)
                    }
                    Err(e) => {
                        degrade(ctx, index, &e);
                        let analysis = CellAnalysis {
                            index,
                            rect,
                            frame: 0,
                            frame_edges: FrameTrim::default(),
                            bounds: None,
                            degraded: true,
                        };
                        let cell = PreparedCell {
                            index,
                            rect,
                            stripped: raw.clone(),
                            raw,
                            content: None,
                        };
                        (cell, analysis)
                    }
                }
            })
            .collect()
    });
    timings.analyze = started.elapsed();

    let (cells, mut cell_analyses): (Vec<_>, Vec<_>) = analyzed.into_iter().unzip();
    cell_analyses.sort_by_key(|c| c.index);

    Ok(Prepared {
        analysis: GridAnalysis {
            source_format,
            source_width,
            source_height,
            sheet_frame_edges,
            sheet_frame,
            grid,
            cells: cell_analyses,
        },
        cells,
        pool,
        timings,
    })
}

/// Frame strip, bounds scan and crop for one cell.
///
/// Returns the frame-stripped cell, the cropped content (`None` for an empty
/// cell) and the analysis.
fn analyze_cell(
    index: usize,
    rect: CellRect,
    raw: &RgbaImage,
    options: &SplitOptions,
) -> (RgbaImage, Option<RgbaImage>, CellAnalysis) {
    let (frame_edges, trimmed, frame) = if options.frame.per_cell {
        let (trimmed, edges, applied) =
            strip_frame(raw.clone(), &options.frame, &options.background);
        (edges, trimmed, applied)
    } else {
        (FrameTrim::default(), raw.clone(), 0)
    };

    let local = scan_content_bounds(&trimmed, &options.background);
    let content = local.map(|b| crop_to_bounds(&trimmed, &b));

    // Report bounds relative to the untrimmed cell.
    let bounds = local.map(|b| ContentBounds {
        min_x: b.min_x + frame,
        min_y: b.min_y + frame,
        max_x: b.max_x + frame,
        max_y: b.max_y + frame,
    });

    (
        trimmed,
        content,
        CellAnalysis {
            index,
            rect,
            frame,
            frame_edges,
            bounds,
            degraded: false,
        },
    )
}

/// Normalize and encode one cell, falling back to its raw sub-image.
///
/// The flag is true when the fallback was used.
fn render_cell(
    cell: PreparedCell,
    target: TargetSize,
    allow_upscale: bool,
    options: &SplitOptions,
    ctx: &SplitContext,
) -> Result<(EncodedCell, bool), SplitError> {
    let index = cell.index;
    let pixels = cell.content.as_ref().unwrap_or(&cell.stripped);

    let attempt = guarded(|| {
        #[cfg(test)]
        ctx.check_fault(index, FaultStage::Render);
        Ok(encode_normalized(pixels, target, allow_upscale, options)?)
    });
    let (bytes, degraded) = match attempt {
        Ok(bytes) => (bytes, false),
        Err(e) => {
            degrade(ctx, index, &e);
            let fallback = guarded(|| {
                Ok(encode_normalized(&cell.raw, target, allow_upscale, options)?)
            });
            let bytes = fallback.map_err(|e| e.into_split_error(index))?;
            (bytes, true)
        }
    };

    ctx.emit(SplitEvent::CellEncoded {
        index,
        bytes: bytes.len(),
    });
    Ok((
        EncodedCell {
            index,
            row: cell.rect.row,
            col: cell.rect.col,
            width: target.width,
            height: target.height,
            format: options.output_format,
            bytes,
        },
        degraded,
    ))
}

fn encode_normalized(
    source: &RgbaImage,
    target: TargetSize,
    allow_upscale: bool,
    options: &SplitOptions,
) -> Result<Vec<u8>, EncodeError> {
    let normalized = normalize_cell(source, target, options.fit, allow_upscale);
    encode_cell(&normalized, options.output_format)
}

/// Run one cell stage, turning a panic into a [`CellError`].
fn guarded<T>(op: impl FnOnce() -> Result<T, CellError>) -> Result<T, CellError> {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(payload) => Err(CellError::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn degrade(ctx: &SplitContext, index: usize, error: &CellError) {
    tracing::warn!(
        label = %ctx.label,
        cell = index,
        error = %error,
        "cell processing failed, using raw sub-image"
    );
    ctx.emit(SplitEvent::CellDegraded {
        index,
        reason: error.to_string(),
    });
}

/// Number of cell workers: one per cell, capped by `max_workers`.
pub fn worker_count(cells: usize, max_workers: Option<usize>) -> usize {
    max_workers.map_or(cells, |n| n.min(cells)).max(1)
}

fn build_pool(options: &SplitOptions, cells: usize) -> Result<Option<ThreadPool>, SplitError> {
    match options.pool {
        PoolStrategy::Shared => Ok(None),
        PoolStrategy::PerCall => {
            let threads = worker_count(cells, options.max_workers);
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("gridcut-cell-{i}"))
                .build()?;
            Ok(Some(pool))
        }
    }
}

/// Run `op` inside the per-call pool, or on rayon's global pool.
fn on_pool<R: Send>(pool: Option<&ThreadPool>, op: impl FnOnce() -> R + Send) -> R {
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        BLACK, WHITE, decode_rgba, draw_border, encode_png, fill_rect, icon_sheet, solid_canvas,
    };

    #[test]
    fn worker_count_is_one_per_cell() {
        assert_eq!(worker_count(4, None), 4);
        assert_eq!(worker_count(9, Some(2)), 2);
        assert_eq!(worker_count(4, Some(16)), 4);
        assert_eq!(worker_count(1, Some(0)), 1);
    }

    #[test]
    fn default_options_follow_stock_config() {
        let o = SplitOptions::default();
        assert_eq!(o.grid, GridSpec::ICONS);
        assert_eq!(o.target, None);
        assert_eq!(o.fit, FitPolicy::Contain);
        assert_eq!(o.grid_policy, GridPolicy::Even);
        assert_eq!(o.pool, PoolStrategy::PerCall);
    }

    #[test]
    fn all_white_sheet_returns_raw_cells() {
        let bytes = encode_png(&solid_canvas(900, 900, WHITE));
        let out = split_grid_with_context(&bytes, &SplitOptions::default(), &SplitContext::new("white"))
            .unwrap();
        assert_eq!(out.cells.len(), 9);
        for (i, cell) in out.cells.iter().enumerate() {
            assert_eq!(cell.index, i);
            assert_eq!((cell.width, cell.height), (300, 300));
            let px = decode_rgba(&cell.bytes);
            assert_eq!(px.dimensions(), (300, 300));
            assert!(px.pixels().all(|p| p.0 == WHITE));
        }
        assert!(out.report.analysis.cells.iter().all(|c| c.bounds.is_none()));
        assert!(out.report.degraded_cells().is_empty());
    }

    #[test]
    fn sheet_border_is_removed_before_splitting() {
        let mut sheet = solid_canvas(600, 600, WHITE);
        draw_border(&mut sheet, 3, BLACK);
        let bytes = encode_png(&sheet);
        let options = SplitOptions {
            grid: GridSpec::ILLUSTRATIONS,
            ..SplitOptions::default()
        };
        let out = split_grid_with_context(&bytes, &options, &SplitContext::default()).unwrap();
        assert_eq!(out.report.analysis.sheet_frame, 3);
        assert_eq!(out.cells.len(), 4);
        for cell in &out.cells {
            let px = decode_rgba(&cell.bytes);
            assert!(px.pixels().all(|p| p.0 == WHITE), "cell {} kept border", cell.index);
        }
    }

    #[test]
    fn per_cell_frames_are_removed_when_sheet_pass_is_off() {
        let mut sheet = solid_canvas(600, 600, WHITE);
        draw_border(&mut sheet, 3, BLACK);
        let bytes = encode_png(&sheet);
        let mut options = SplitOptions {
            grid: GridSpec::ILLUSTRATIONS,
            ..SplitOptions::default()
        };
        options.frame.whole_image = false;
        let out = split_grid_with_context(&bytes, &options, &SplitContext::default()).unwrap();
        for (cell, analysis) in out.cells.iter().zip(&out.report.analysis.cells) {
            assert!(analysis.frame > 0 && analysis.frame <= 3);
            let px = decode_rgba(&cell.bytes);
            assert!(px.pixels().all(|p| p.0 == WHITE));
        }
    }

    #[test]
    fn outputs_share_dimensions_and_order() {
        let mut sheet = icon_sheet(900, 900, 3, 3, 50);
        // Make one icon much wider than the others.
        fill_rect(&mut sheet, 310, 420, 280, 40, [10, 10, 10, 255]);
        let bytes = encode_png(&sheet);
        let out = split_grid_with_context(&bytes, &SplitOptions::default(), &SplitContext::default())
            .unwrap();
        let (w, h) = (out.cells[0].width, out.cells[0].height);
        assert_eq!(out.report.target, TargetSize { width: w, height: h });
        for (i, cell) in out.cells.iter().enumerate() {
            assert_eq!(cell.index, i);
            assert_eq!((cell.row, cell.col), ((i / 3) as u32, (i % 3) as u32));
            assert_eq!(decode_rgba(&cell.bytes).dimensions(), (w, h));
        }
    }

    #[test]
    fn explicit_cover_target_has_no_padding() {
        let bytes = encode_png(&icon_sheet(400, 400, 2, 2, 60));
        let options = SplitOptions {
            grid: GridSpec::ILLUSTRATIONS,
            target: Some(TargetSize {
                width: 64,
                height: 48,
            }),
            fit: FitPolicy::Cover,
            ..SplitOptions::default()
        };
        let cells = split_grid(&bytes, &options).unwrap();
        assert_eq!(cells.len(), 4);
        for cell in cells {
            let px = decode_rgba(&cell.bytes);
            assert_eq!(px.dimensions(), (64, 48));
            assert!(px.pixels().all(|p| p.0[3] == 255));
        }
    }

    #[test]
    fn bounds_stay_inside_their_cells() {
        let bytes = encode_png(&icon_sheet(600, 450, 3, 3, 70));
        let analysis =
            analyze_grid(&bytes, &SplitOptions::default(), &SplitContext::default()).unwrap();
        for cell in &analysis.cells {
            let b = cell.bounds.expect("every cell has an icon");
            assert!(b.fits_within(cell.rect.width, cell.rect.height));
        }
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let bytes = encode_png(&icon_sheet(300, 300, 3, 3, 40));
        let a = split_grid(&bytes, &SplitOptions::default()).unwrap();
        let b = split_grid(&bytes, &SplitOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shared_pool_gives_same_result() {
        let bytes = encode_png(&icon_sheet(300, 300, 3, 3, 40));
        let shared = SplitOptions {
            pool: PoolStrategy::Shared,
            ..SplitOptions::default()
        };
        assert_eq!(
            split_grid(&bytes, &shared).unwrap(),
            split_grid(&bytes, &SplitOptions::default()).unwrap()
        );
    }

    #[test]
    fn corrupt_input_produces_nothing() {
        let bytes = encode_png(&solid_canvas(90, 90, WHITE));
        let err = split_grid(&bytes[..20], &SplitOptions::default()).unwrap_err();
        assert!(matches!(err, SplitError::Decode(_)));
    }

    #[test]
    fn invalid_grid_is_rejected() {
        let bytes = encode_png(&solid_canvas(90, 90, WHITE));
        let options = SplitOptions {
            grid: GridSpec::new(0, 3),
            ..SplitOptions::default()
        };
        assert!(matches!(
            split_grid(&bytes, &options),
            Err(SplitError::InvalidGrid(_))
        ));
    }

    #[test]
    fn image_smaller_than_grid_is_rejected() {
        let bytes = encode_png(&solid_canvas(2, 2, WHITE));
        assert!(matches!(
            split_grid(&bytes, &SplitOptions::default()),
            Err(SplitError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn events_are_reported() {
        let bytes = encode_png(&icon_sheet(200, 200, 2, 2, 50));
        let (tx, rx) = std::sync::mpsc::channel();
        let ctx = SplitContext::new("events").with_events(tx);
        let options = SplitOptions {
            grid: GridSpec::ILLUSTRATIONS,
            ..SplitOptions::default()
        };
        split_grid_with_context(&bytes, &options, &ctx).unwrap();
        drop(ctx);
        let events: Vec<SplitEvent> = rx.into_iter().collect();
        assert!(matches!(events[0], SplitEvent::Decoded { width: 200, .. }));
        let analyzed = events
            .iter()
            .filter(|e| matches!(e, SplitEvent::CellAnalyzed { .. }))
            .count();
        let encoded = events
            .iter()
            .filter(|e| matches!(e, SplitEvent::CellEncoded { .. }))
            .count();
        assert_eq!((analyzed, encoded), (4, 4));
    }

    fn degraded_events(events: Vec<SplitEvent>) -> Vec<(usize, String)> {
        events
            .into_iter()
            .filter_map(|e| match e {
                SplitEvent::CellDegraded { index, reason } => Some((index, reason)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn analysis_panic_degrades_only_that_cell() {
        let bytes = encode_png(&icon_sheet(200, 200, 2, 2, 50));
        let (tx, rx) = std::sync::mpsc::channel();
        let ctx = SplitContext::new("fault")
            .with_events(tx)
            .with_fault(2, FaultStage::Analyze);
        let options = SplitOptions {
            grid: GridSpec::ILLUSTRATIONS,
            ..SplitOptions::default()
        };
        let out = split_grid_with_context(&bytes, &options, &ctx).unwrap();
        drop(ctx);

        assert_eq!(out.cells.len(), 4);
        assert_eq!(out.report.degraded_cells(), vec![2]);
        assert_eq!(out.report.analysis.cells[2].bounds, None);
        for cell in &out.cells {
            let px = decode_rgba(&cell.bytes);
            assert_eq!(px.dimensions(), (out.report.target.width, out.report.target.height));
        }
        let degraded = degraded_events(rx.into_iter().collect());
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].0, 2);
        assert!(degraded[0].1.contains("panicked"), "{}", degraded[0].1);
    }

    #[test]
    fn render_panic_falls_back_to_raw_cell() {
        let bytes = encode_png(&icon_sheet(200, 200, 2, 2, 50));
        let (tx, rx) = std::sync::mpsc::channel();
        let ctx = SplitContext::new("fault")
            .with_events(tx)
            .with_fault(1, FaultStage::Render);
        let options = SplitOptions {
            grid: GridSpec::ILLUSTRATIONS,
            ..SplitOptions::default()
        };
        let out = split_grid_with_context(&bytes, &options, &ctx).unwrap();
        drop(ctx);

        assert_eq!(out.cells.len(), 4);
        assert_eq!(out.report.degraded_cells(), vec![1]);
        // Analysis itself succeeded for the degraded cell.
        assert!(out.report.analysis.cells[1].bounds.is_some());
        let px = decode_rgba(&out.cells[1].bytes);
        assert_eq!(px.dimensions(), (out.cells[0].width, out.cells[0].height));
        let degraded = degraded_events(rx.into_iter().collect());
        assert_eq!(degraded.iter().map(|d| d.0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let err = guarded::<()>(|| panic!("bad cell {}", 7)).unwrap_err();
        assert!(matches!(err, CellError::Panicked(ref m) if m == "bad cell 7"));
        let err = guarded::<()>(|| panic!("static")).unwrap_err();
        assert!(matches!(err, CellError::Panicked(ref m) if m == "static"));
    }

    #[test]
    fn oversized_webp_target_is_rejected_before_decoding() {
        let options = SplitOptions {
            target: Some(TargetSize {
                width: 20_000,
                height: 4,
            }),
            output_format: OutputFormat::WebP,
            ..SplitOptions::default()
        };
        assert!(matches!(
            split_grid(b"not an image", &options),
            Err(SplitError::InvalidTarget(TargetSize { width: 20_000, .. }))
        ));
    }

    #[test]
    fn oversized_derived_target_is_rejected() {
        let bytes = encode_png(&solid_canvas(16_400, 2, BLACK));
        let mut options = SplitOptions {
            grid: GridSpec::new(1, 1),
            output_format: OutputFormat::WebP,
            ..SplitOptions::default()
        };
        options.frame.whole_image = false;
        options.frame.per_cell = false;
        assert!(matches!(
            split_grid(&bytes, &options),
            Err(SplitError::InvalidTarget(TargetSize { width: 16_400, .. }))
        ));

        options.output_format = OutputFormat::Png;
        let cells = split_grid(&bytes, &options).unwrap();
        assert_eq!((cells[0].width, cells[0].height), (16_400, 2));
    }

    #[test]
    fn cell_rects_are_in_source_coordinates() {
        let mut sheet = solid_canvas(600, 600, WHITE);
        draw_border(&mut sheet, 3, BLACK);
        let options = SplitOptions {
            grid: GridSpec::ILLUSTRATIONS,
            ..SplitOptions::default()
        };
        let analysis =
            analyze_grid(&encode_png(&sheet), &options, &SplitContext::default()).unwrap();
        assert_eq!(analysis.sheet_frame, 3);
        let origins: Vec<(u32, u32)> = analysis
            .cells
            .iter()
            .map(|c| (c.rect.x, c.rect.y))
            .collect();
        assert_eq!(origins, vec![(3, 3), (300, 3), (3, 300), (300, 300)]);
        assert!(analysis.cells.iter().all(|c| c.rect.width == 297));
    }

    #[test]
    fn analyze_cell_reports_bounds_in_cell_coordinates() {
        let mut raw = solid_canvas(100, 100, WHITE);
        draw_border(&mut raw, 2, BLACK);
        fill_rect(&mut raw, 40, 30, 10, 20, [200, 0, 0, 255]);
        let rect = CellRect {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
            row: 0,
            col: 0,
        };
        let (stripped, content, analysis) = analyze_cell(0, rect, &raw, &SplitOptions::default());
        assert_eq!(stripped.dimensions(), (96, 96));
        assert_eq!(analysis.frame, 2);
        assert_eq!(
            analysis.bounds,
            Some(ContentBounds {
                min_x: 40,
                min_y: 30,
                max_x: 50,
                max_y: 50
            })
        );
        assert_eq!(content.unwrap().dimensions(), (10, 20));
    }
}
