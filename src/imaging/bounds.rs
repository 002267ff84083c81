//! Content bounding box of a cell.
//!
//! Artwork is composed on a transparent or white canvas (the generation
//! prompts ask for that), so anything that is neither transparent nor
//! near-white is content. This is a full scan; cells are small enough that
//! sampling would only add ways to miss thin strokes.

use super::params::BackgroundSettings;
use crate::types::ContentBounds;
use image::RgbaImage;

/// Tight box around every non-background pixel, or `None` for an empty cell.
pub fn scan_content_bounds(
    image: &RgbaImage,
    background: &BackgroundSettings,
) -> Option<ContentBounds> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for (x, y, px) in image.enumerate_pixels() {
        if background.is_background(px) {
            continue;
        }
        found = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    found.then(|| ContentBounds {
        min_x,
        min_y,
        max_x: max_x + 1,
        max_y: max_y + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fill_rect, solid_canvas};

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn centered_square_resolves_exact_box() {
        let mut img = solid_canvas(300, 300, WHITE);
        fill_rect(&mut img, 25, 25, 250, 250, [200, 40, 40, 255]);
        let b = scan_content_bounds(&img, &BackgroundSettings::default()).unwrap();
        assert_eq!(
            b,
            ContentBounds {
                min_x: 25,
                min_y: 25,
                max_x: 275,
                max_y: 275
            }
        );
        assert!(b.fits_within(300, 300));
    }

    #[test]
    fn all_white_is_empty() {
        let img = solid_canvas(300, 300, WHITE);
        assert_eq!(scan_content_bounds(&img, &BackgroundSettings::default()), None);
    }

    #[test]
    fn transparent_pixels_are_background_whatever_their_color() {
        let img = solid_canvas(50, 50, [0, 0, 0, 9]);
        assert_eq!(scan_content_bounds(&img, &BackgroundSettings::default()), None);
    }

    #[test]
    fn off_white_counts_as_content() {
        let mut img = solid_canvas(50, 50, WHITE);
        img.put_pixel(10, 40, image::Rgba([246, 246, 240, 255]));
        let b = scan_content_bounds(&img, &BackgroundSettings::default()).unwrap();
        assert_eq!((b.min_x, b.min_y, b.width(), b.height()), (10, 40, 1, 1));
    }

    #[test]
    fn scattered_pixels_span_the_box() {
        let mut img = solid_canvas(100, 80, [0, 0, 0, 0]);
        img.put_pixel(3, 70, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(90, 5, image::Rgba([0, 0, 0, 255]));
        let b = scan_content_bounds(&img, &BackgroundSettings::default()).unwrap();
        assert_eq!(
            b,
            ContentBounds {
                min_x: 3,
                min_y: 5,
                max_x: 91,
                max_y: 71
            }
        );
    }
}
