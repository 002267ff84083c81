//! Crop-and-scale to the batch's uniform size.
//!
//! | Policy | Scale | Result |
//! |---|---|---|
//! | [`FitPolicy::Contain`] | `min(tw/cw, th/ch)` | whole content, centred, transparent padding |
//! | [`FitPolicy::Cover`] | `max(tw/cw, th/ch)` | no padding, overflow centre-cropped |
//!
//! Resampling is bilinear (`FilterType::Triangle`). The `image` crate widens
//! the filter support when shrinking, which gives antialiased downscales.

use super::calculations::{center_offset, scaled_dimensions};
use super::params::{FitPolicy, TargetSize};
use crate::types::ContentBounds;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Copy the pixels inside `bounds` into a new buffer.
pub fn crop_to_bounds(image: &RgbaImage, bounds: &ContentBounds) -> RgbaImage {
    imageops::crop_imm(image, bounds.min_x, bounds.min_y, bounds.width(), bounds.height())
        .to_image()
}

/// Scale `content` into exactly `target.width × target.height`.
///
/// `allow_upscale` only affects [`FitPolicy::Contain`]; cover must always
/// reach the target to avoid padding.
pub fn normalize_cell(
    content: &RgbaImage,
    target: TargetSize,
    policy: FitPolicy,
    allow_upscale: bool,
) -> RgbaImage {
    let (sw, sh) = scaled_dimensions(content.dimensions(), target, policy, allow_upscale);
    let scaled = if (sw, sh) == content.dimensions() {
        content.clone()
    } else {
        imageops::resize(content, sw, sh, FilterType::Triangle)
    };

    match policy {
        FitPolicy::Contain => {
            let mut canvas = RgbaImage::from_pixel(target.width, target.height, Rgba([0, 0, 0, 0]));
            let x = center_offset(target.width, sw);
            let y = center_offset(target.height, sh);
            imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
            canvas
        }
        FitPolicy::Cover => {
            let x = center_offset(sw, target.width);
            let y = center_offset(sh, target.height);
            imageops::crop_imm(&scaled, x, y, target.width, target.height).to_image()
        }
    }
}
