//! Pixel stages of the split pipeline. Pure Rust, no I/O.
//!
//! | Stage | Module | Crate / function |
//! |---|---|---|
//! | **Decode** | [`decode`] | `ImageReader` with limits, explicit `WebPDecoder` fallback, `avif-parse` |
//! | **Frame strip** | [`frame`] | sparse edge sampling |
//! | **Cell rectangles** | [`grid`] | even split / separator scan |
//! | **Content bounds** | [`bounds`] | full pixel scan |
//! | **Normalize** | [`normalize`] | `imageops::resize` (Triangle) + centre pad/crop |
//! | **Encode** | [`encode`] | `PngEncoder` / lossless `WebPEncoder` |
//!
//! Dimension math lives in `calculations` (pure functions, unit testable)
//! and thresholds in [`params`]. The orchestration that runs these stages
//! across cells is in [`pipeline`](crate::pipeline).

pub mod bounds;
mod calculations;
pub mod decode;
pub mod encode;
pub mod frame;
pub mod grid;
pub mod normalize;
pub mod params;

pub use bounds::scan_content_bounds;
pub use calculations::{derive_batch_target, even_spans};
pub use decode::{DecodeError, decode_image, decode_image_with_limits, sniff_format};
pub use encode::{EncodeError, encode_cell};
pub use frame::{detect_frame, strip_frame};
pub use grid::resolve_cells;
pub use normalize::{crop_to_bounds, normalize_cell};
pub use params::{
    BackgroundSettings, FitPolicy, FrameSettings, GridPolicy, GridSpec, OutputFormat,
    PoolStrategy, TargetSize,
};
