//! Decoding source bytes and encoding rendered rasters.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::AdError;

/// Encoded output format of a rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy JPEG, used for distributable size variants.
    Jpeg,
    /// Lossless PNG, used for composition output.
    Png,
}

impl OutputFormat {
    /// MIME type sent as `Content-Type` and used in inline payloads.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// A decoded raster plus the size of the bytes it came from.
///
/// Immutable once decoded; owned by the pipeline run that decoded it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    byte_len: usize,
}

impl SourceImage {
    /// Decode raw image bytes in any format the `image` crate recognises.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::Encode`] if the bytes are empty or not a decodable image.
    pub fn decode(bytes: &[u8]) -> Result<Self, AdError> {
        if bytes.is_empty() {
            return Err(AdError::Encode("Empty image data".to_string()));
        }
        let image = image::load_from_memory(bytes)
            .map_err(|e| AdError::Encode(format!("Failed to decode image: {e}")))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(AdError::Encode("Decoded image has zero width or height".to_string()));
        }
        Ok(Self { image, byte_len: bytes.len() })
    }

    /// Wrap an in-memory raster that did not come from encoded bytes.
    #[must_use]
    pub fn from_image(image: DynamicImage) -> Self {
        Self { image, byte_len: 0 }
    }

    /// The decoded raster.
    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Length of the encoded bytes this was decoded from (0 if built in memory).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Whether the pixel format carries an alpha channel.
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }
}

/// Encode a raster. JPEG input is flattened to RGB first since JPEG has no
/// alpha or palette support.
///
/// # Errors
///
/// Returns [`AdError::Encode`] if the encoder rejects the image.
pub fn encode(image: &DynamicImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>, AdError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)
                .map_err(|e| AdError::Encode(format!("Failed to encode JPEG: {e}")))?;
        }
        OutputFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| AdError::Encode(format!("Failed to encode PNG: {e}")))?;
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 128])));
        encode(&img, OutputFormat::Png, 85).unwrap()
    }

    #[test]
    fn decode_keeps_dimensions_and_length() {
        let bytes = png_bytes(40, 30);
        let source = SourceImage::decode(&bytes).unwrap();
        assert_eq!((source.width(), source.height()), (40, 30));
        assert_eq!(source.byte_len(), bytes.len());
        assert!(source.has_alpha());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(SourceImage::decode(b"not an image"), Err(AdError::Encode(_))));
        assert!(matches!(SourceImage::decode(&[]), Err(AdError::Encode(_))));
    }

    #[test]
    fn jpeg_encode_flattens_alpha() {
        let source = SourceImage::decode(&png_bytes(8, 8)).unwrap();
        let jpeg = encode(source.image(), OutputFormat::Jpeg, 85).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        let back = SourceImage::decode(&jpeg).unwrap();
        assert!(!back.has_alpha());
        assert_eq!((back.width(), back.height()), (8, 8));
    }

    #[test]
    fn format_metadata() {
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(serde_json::to_string(&OutputFormat::Jpeg).unwrap(), "\"jpeg\"");
    }
}
