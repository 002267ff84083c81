//! Frame artifact detection.
//!
//! Generators sometimes paint a thin solid border around the whole sheet or
//! around individual cells. Each edge is sampled line by line, from the
//! outermost pixel inwards, at a sparse stride. A line is part of the frame if
//! at least `solid_ratio` of its samples are solid, and a thickness `t` is
//! only accepted when every line up to `t` passed. The thickest accepted edge
//! is trimmed from all four sides.
//!
//! A sample is solid when it is visible (alpha above the noise threshold) and
//! not canvas-white. Plain white or transparent margins are padding, which
//! content-bound trimming handles later.

use super::params::{BackgroundSettings, FrameSettings, MAX_FRAME_THICKNESS};
use crate::types::FrameTrim;
use image::{Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

fn is_solid(px: &Rgba<u8>, frame: &FrameSettings, background: &BackgroundSettings) -> bool {
    let [r, g, b, a] = px.0;
    let w = background.white_threshold;
    a > frame.alpha_threshold && !(r > w && g > w && b > w)
}

/// Accepted frame thickness on one edge, 0 when the outermost line fails.
fn edge_thickness(
    image: &RgbaImage,
    edge: Edge,
    frame: &FrameSettings,
    background: &BackgroundSettings,
) -> u32 {
    let (w, h) = image.dimensions();
    let (len, depth) = match edge {
        Edge::Top | Edge::Bottom => (w, h),
        Edge::Left | Edge::Right => (h, w),
    };
    if len == 0 || depth == 0 {
        return 0;
    }

    // Both opposite frames together must leave at least one pixel.
    let max_t = frame
        .max_thickness
        .min(MAX_FRAME_THICKNESS)
        .min((depth - 1) / 2);
    let stride = (len / frame.samples_per_edge.max(1)).max(1) as usize;

    let mut accepted = 0;
    for t in 1..=max_t {
        let d = t - 1;
        let mut total = 0u32;
        let mut solid = 0u32;
        for i in (0..len).step_by(stride) {
            let (x, y) = match edge {
                Edge::Top => (i, d),
                Edge::Bottom => (i, h - 1 - d),
                Edge::Left => (d, i),
                Edge::Right => (w - 1 - d, i),
            };
            total += 1;
            if is_solid(image.get_pixel(x, y), frame, background) {
                solid += 1;
            }
        }
        if (solid as f32) < frame.solid_ratio * total as f32 {
            break;
        }
        accepted = t;
    }
    accepted
}

/// Measure the frame on each edge without modifying the image.
pub fn detect_frame(
    image: &RgbaImage,
    frame: &FrameSettings,
    background: &BackgroundSettings,
) -> FrameTrim {
    FrameTrim {
        top: edge_thickness(image, Edge::Top, frame, background),
        right: edge_thickness(image, Edge::Right, frame, background),
        bottom: edge_thickness(image, Edge::Bottom, frame, background),
        left: edge_thickness(image, Edge::Left, frame, background),
    }
}

/// Remove a detected frame from every side.
///
/// Returns the image, the per-edge measurement, and the number of pixels
/// removed from each side. The image is returned untouched when no edge
/// carries a frame or the trim would consume it.
pub fn strip_frame(
    image: RgbaImage,
    frame: &FrameSettings,
    background: &BackgroundSettings,
) -> (RgbaImage, FrameTrim, u32) {
    let edges = detect_frame(&image, frame, background);
    let t = edges.thickness();
    let (w, h) = image.dimensions();
    if t == 0 || 2 * t >= w || 2 * t >= h {
        return (image, edges, 0);
    }
    let inner = image::imageops::crop_imm(&image, t, t, w - 2 * t, h - 2 * t).to_image();
    (inner, edges, t)
}
