//! Deterministic product placement used when generation yields no image.

use image::imageops::{self, FilterType};
use image::DynamicImage;

use super::codec::SourceImage;
use crate::error::AdError;

/// Where the scaled product lands on the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Left offset, floored; negative when the product overhangs the template.
    pub left: i64,
    /// Top offset; negative when the product overhangs the template.
    pub top: i64,
    /// Scaled product width (a quarter of the template width).
    pub width: u32,
    /// Scaled product height (aspect preserved).
    pub height: u32,
}

/// Compute the fallback placement for a product on a template.
///
/// The product is scaled to a quarter of the template width, keeps its own
/// aspect ratio, and is centered on both axes. Rectangle metadata is ignored.
///
/// # Errors
///
/// Returns [`AdError::Encode`] if any side is zero or the scaled product
/// would have zero width or height.
pub fn overlay_placement(product: (u32, u32), template: (u32, u32)) -> Result<Placement, AdError> {
    let (pw, ph) = product;
    let (tw, th) = template;
    if pw == 0 || ph == 0 || tw == 0 || th == 0 {
        return Err(AdError::Encode(format!(
            "Cannot overlay {pw}x{ph} product on {tw}x{th} template"
        )));
    }

    let width = tw / 4;
    let height = u64::from(width) * u64::from(ph) / u64::from(pw);
    let height = u32::try_from(height)
        .map_err(|_| AdError::Encode(format!("Scaled product height {height} overflows")))?;
    if width == 0 || height == 0 {
        return Err(AdError::Encode(format!(
            "Scaled product {width}x{height} is empty for {tw}x{th} template"
        )));
    }

    Ok(Placement {
        left: (i64::from(tw) - i64::from(width)).div_euclid(2),
        top: (i64::from(th) - i64::from(height)).div_euclid(2),
        width,
        height,
    })
}

/// Paste the scaled product onto the center of a copy of the template.
///
/// A product with an alpha channel is blended through that channel; an
/// opaque product replaces the pixels underneath.
///
/// # Errors
///
/// Returns [`AdError::Encode`] if the placement cannot be computed.
pub fn overlay(product: &SourceImage, template: &SourceImage) -> Result<SourceImage, AdError> {
    let placement =
        overlay_placement((product.width(), product.height()), (template.width(), template.height()))?;

    let scaled = product
        .image()
        .resize_exact(placement.width, placement.height, FilterType::Lanczos3)
        .to_rgba8();
    let mut base = template.image().to_rgba8();

    if product.has_alpha() {
        imageops::overlay(&mut base, &scaled, placement.left, placement.top);
    } else {
        imageops::replace(&mut base, &scaled, placement.left, placement.top);
    }

    Ok(SourceImage::from_image(DynamicImage::ImageRgba8(base)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn template(width: u32, height: u32) -> SourceImage {
        SourceImage::from_image(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([255, 0, 0]),
        )))
    }

    #[test]
    fn placement_for_four_by_three_product() {
        let p = overlay_placement((400, 300), (1200, 1200)).unwrap();
        assert_eq!(p, Placement { left: 450, top: 487, width: 300, height: 225 });
    }

    #[test]
    fn placement_rejects_degenerate_inputs() {
        assert!(overlay_placement((0, 10), (100, 100)).is_err());
        assert!(overlay_placement((10, 10), (0, 100)).is_err());
        // Template too narrow to give the product any width.
        assert!(overlay_placement((10, 10), (3, 100)).is_err());
        // Very wide product collapses to zero height.
        assert!(overlay_placement((10_000, 1), (400, 400)).is_err());
    }

    #[test]
    fn odd_overhang_rounds_toward_negative() {
        let p = overlay_placement((100, 1001), (400, 200)).unwrap();
        assert_eq!((p.left, p.top), (150, -401));
        assert_eq!((p.width, p.height), (100, 1001));
    }

    #[test]
    fn tall_product_overhangs_and_is_clipped() {
        let p = overlay_placement((10, 100), (400, 200)).unwrap();
        assert_eq!((p.width, p.height), (100, 1000));
        assert_eq!(p.top, -400);

        let product = SourceImage::from_image(DynamicImage::ImageRgb8(RgbImage::new(10, 100)));
        let out = overlay(&product, &template(400, 200)).unwrap();
        assert_eq!((out.width(), out.height()), (400, 200));
    }

    #[test]
    fn opaque_product_replaces_center() {
        let product = SourceImage::from_image(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            40,
            30,
            Rgb([0, 0, 255]),
        )));
        let out = overlay(&product, &template(120, 120)).unwrap();
        assert_eq!((out.width(), out.height()), (120, 120));
        let px = out.image().to_rgba8();
        assert_eq!(px.get_pixel(60, 60), &Rgba([0, 0, 255, 255]));
        assert_eq!(px.get_pixel(5, 5), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn transparent_product_uses_alpha_mask() {
        let product = SourceImage::from_image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            40,
            30,
            Rgba([0, 0, 255, 0]),
        )));
        let out = overlay(&product, &template(120, 120)).unwrap();
        assert_eq!(out.image().to_rgba8().get_pixel(60, 60), &Rgba([255, 0, 0, 255]));
    }
}
