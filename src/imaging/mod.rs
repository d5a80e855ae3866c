//! Pixel work: decoding, center-crop resizing, and the fallback overlay.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode | `image::load_from_memory` |
//! | Crop | `DynamicImage::crop_imm` on a window from [`crop::crop_window`] |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode | `JpegEncoder` (RGB only) or PNG via `write_to` |
//! | Overlay | `imageops::overlay` (alpha) / `imageops::replace` (opaque) |

pub mod codec;
pub mod crop;
pub mod overlay;

pub use codec::{encode, OutputFormat, SourceImage};
pub use overlay::overlay;
