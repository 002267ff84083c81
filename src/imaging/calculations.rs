//! Pure calculation functions for grid and cell dimensions.
//!
//! All functions here are pure and testable without any pixels.

use super::params::{FitPolicy, TargetSize};

/// Split `len` pixels into `parts` spans of `floor(len / parts)`, the last
/// span absorbing the remainder.
///
/// Returns `(offset, length)` pairs that tile `0..len` without gaps.
pub fn even_spans(len: u32, parts: u32) -> Vec<(u32, u32)> {
    let step = len / parts;
    (0..parts)
        .map(|i| {
            let start = i * step;
            let size = if i == parts - 1 { len - start } else { step };
            (start, size)
        })
        .collect()
}

/// Scaled content size for a fit policy.
///
/// * `Contain` scales by `min(tw/cw, th/ch)`; the result never exceeds the
///   target on either axis. With `allow_upscale == false` the scale is capped
///   at 1.0, so small content keeps its native size.
/// * `Cover` scales by `max(tw/cw, th/ch)`; the result is never smaller than
///   the target on either axis.
///
/// Both axes are at least 1 pixel.
pub fn scaled_dimensions(
    content: (u32, u32),
    target: TargetSize,
    policy: FitPolicy,
    allow_upscale: bool,
) -> (u32, u32) {
    let (cw, ch) = (content.0.max(1) as f64, content.1.max(1) as f64);
    let sx = target.width as f64 / cw;
    let sy = target.height as f64 / ch;

    match policy {
        FitPolicy::Contain => {
            let mut scale = sx.min(sy);
            if !allow_upscale {
                scale = scale.min(1.0);
            }
            let w = ((cw * scale).round() as u32).clamp(1, target.width);
            let h = ((ch * scale).round() as u32).clamp(1, target.height);
            (w, h)
        }
        FitPolicy::Cover => {
            let scale = sx.max(sy);
            let w = ((cw * scale).round() as u32).max(target.width);
            let h = ((ch * scale).round() as u32).max(target.height);
            (w, h)
        }
    }
}

/// Offset that centres a span of `inner` pixels within `outer`.
pub fn center_offset(outer: u32, inner: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

/// Uniform output size for a batch.
///
/// An explicit size wins. Otherwise the largest content width and height
/// across non-empty cells; if every cell is empty, the largest raw cell.
pub fn derive_batch_target(
    explicit: Option<TargetSize>,
    content_sizes: &[Option<(u32, u32)>],
    raw_sizes: &[(u32, u32)],
) -> TargetSize {
    if let Some(size) = explicit {
        return size;
    }
    let (mut w, mut h) = max_extent(content_sizes.iter().flatten().copied());
    if w == 0 || h == 0 {
        (w, h) = max_extent(raw_sizes.iter().copied());
    }
    TargetSize {
        width: w.max(1),
        height: h.max(1),
    }
}

fn max_extent(sizes: impl Iterator<Item = (u32, u32)>) -> (u32, u32) {
    sizes.fold((0, 0), |(mw, mh), (w, h)| (mw.max(w), mh.max(h)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: u32, height: u32) -> TargetSize {
        TargetSize { width, height }
    }

    // =========================================================================
    // even_spans tests
    // =========================================================================

    #[test]
    fn even_spans_exact_division() {
        assert_eq!(even_spans(600, 2), vec![(0, 300), (300, 300)]);
    }

    #[test]
    fn even_spans_remainder_to_last() {
        assert_eq!(even_spans(10, 3), vec![(0, 3), (3, 3), (6, 4)]);
    }

    #[test]
    fn even_spans_single_part() {
        assert_eq!(even_spans(17, 1), vec![(0, 17)]);
    }

    #[test]
    fn even_spans_always_sum_to_len() {
        for len in [1u32, 7, 99, 512, 1023] {
            for parts in 1..=len.min(16) {
                let total: u32 = even_spans(len, parts).iter().map(|s| s.1).sum();
                assert_eq!(total, len, "len={len} parts={parts}");
            }
        }
    }

    // =========================================================================
    // scaled_dimensions tests
    // =========================================================================

    #[test]
    fn contain_wide_content_matches_width() {
        // 400x200 into 100x100 → scale 0.25 → 100x50
        assert_eq!(
            scaled_dimensions((400, 200), size(100, 100), FitPolicy::Contain, true),
            (100, 50)
        );
    }

    #[test]
    fn contain_upscales_only_when_allowed() {
        assert_eq!(
            scaled_dimensions((50, 25), size(200, 200), FitPolicy::Contain, true),
            (200, 100)
        );
        assert_eq!(
            scaled_dimensions((50, 25), size(200, 200), FitPolicy::Contain, false),
            (50, 25)
        );
    }

    #[test]
    fn cover_tall_content_matches_width() {
        // 100x300 into 200x200 → scale 2 → 200x600
        assert_eq!(
            scaled_dimensions((100, 300), size(200, 200), FitPolicy::Cover, false),
            (200, 600)
        );
    }

    #[test]
    fn cover_never_smaller_than_target() {
        let (w, h) = scaled_dimensions((333, 77), size(128, 128), FitPolicy::Cover, true);
        assert!(w >= 128 && h >= 128);
        assert_eq!(h, 128);
    }

    #[test]
    fn degenerate_content_still_yields_pixels() {
        let (w, h) = scaled_dimensions((1000, 1), size(10, 10), FitPolicy::Contain, true);
        assert_eq!((w, h), (10, 1));
    }

    #[test]
    fn center_offset_splits_padding() {
        assert_eq!(center_offset(100, 50), 25);
        assert_eq!(center_offset(101, 50), 25);
        assert_eq!(center_offset(50, 60), 0);
    }

    // =========================================================================
    // derive_batch_target tests
    // =========================================================================

    #[test]
    fn explicit_target_wins() {
        let t = derive_batch_target(Some(size(64, 32)), &[Some((500, 500))], &[(600, 600)]);
        assert_eq!(t, size(64, 32));
    }

    #[test]
    fn derived_target_uses_max_per_axis() {
        let t = derive_batch_target(
            None,
            &[Some((200, 100)), None, Some((120, 180))],
            &[(300, 300), (300, 300), (300, 300)],
        );
        assert_eq!(t, size(200, 180));
    }

    #[test]
    fn all_empty_falls_back_to_raw_cells() {
        let t = derive_batch_target(None, &[None, None], &[(300, 300), (301, 299)]);
        assert_eq!(t, size(301, 300));
    }
}
