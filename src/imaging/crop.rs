//! Center-crop to the target aspect ratio, then resize to the exact target size.

use image::imageops::FilterType;
use image::DynamicImage;

use super::codec::{OutputFormat, SourceImage};
use crate::catalog::DimensionSpec;

/// A crop rectangle inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    /// Left offset.
    pub left: u32,
    /// Top offset.
    pub top: u32,
    /// Window width.
    pub width: u32,
    /// Window height.
    pub height: u32,
}

/// A resized raster plus the format the caller wants it encoded in.
#[derive(Debug, Clone)]
pub struct RenderedRaster {
    /// Pixels at exactly the target size.
    pub image: DynamicImage,
    /// Requested output format.
    pub format: OutputFormat,
}

/// Compute the centered window of `source` that matches the target aspect ratio.
///
/// Ratios are compared by cross-multiplication so equal ratios are detected
/// exactly and yield the full source. A source that is relatively wider loses
/// columns (`width = floor(h * tw / th)`), otherwise rows
/// (`height = floor(w * th / tw)`). Offsets are floored halves of the leftover.
#[must_use]
pub fn crop_window(source: (u32, u32), target: DimensionSpec) -> CropWindow {
    let (src_w, src_h) = (u64::from(source.0), u64::from(source.1));
    let (tgt_w, tgt_h) = (u64::from(target.width), u64::from(target.height));

    if src_w * tgt_h > tgt_w * src_h {
        // Strictly wider than the target, so new_width < src_w.
        let new_width = (src_h * tgt_w / tgt_h).max(1);
        CropWindow {
            left: to_u32((src_w - new_width) / 2),
            top: 0,
            width: to_u32(new_width),
            height: source.1,
        }
    } else {
        let new_height = (src_w * tgt_h / tgt_w).clamp(1, src_h.max(1));
        CropWindow {
            left: 0,
            top: to_u32((src_h - new_height) / 2),
            width: source.0,
            height: to_u32(new_height),
        }
    }
}

/// Every value passed in is bounded by a `u32` source side.
fn to_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// Crop `source` to the target aspect ratio and resize it to exactly `target`.
#[must_use]
pub fn render(source: &SourceImage, target: DimensionSpec, format: OutputFormat) -> RenderedRaster {
    let window = crop_window((source.width(), source.height()), target);
    let cropped = source.image().crop_imm(window.left, window.top, window.width, window.height);
    let image = cropped.resize_exact(target.width, target.height, FilterType::Lanczos3);
    RenderedRaster { image, format }
}
