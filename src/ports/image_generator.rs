//! Image generator port for AI image composition APIs.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::AdError;

/// An input image handed to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputImage {
    /// Encoded image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// MIME type of `data` (e.g., `"image/png"`).
    pub mime_type: String,
}

/// A request to generate an image from an instruction and input images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The resolved model identifier (e.g., `"gemini-3.1-flash-image-preview"`).
    pub model: String,
    /// Instruction text describing the composition.
    pub instruction: String,
    /// Input images, in the order the instruction refers to them.
    pub images: Vec<InputImage>,
}

/// One part of a mixed text/image response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePart {
    /// Text emitted by the model.
    Text(String),
    /// An inline image.
    Image {
        /// Raw image bytes (decoded from base64).
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        /// MIME type of the image (e.g., `"image/png"`).
        mime_type: String,
    },
}

/// An ordered sequence of response parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Parts in the order the API returned them.
    pub parts: Vec<ResponsePart>,
}

impl GenerationResponse {
    /// The first image part, if any. Later image parts are ignored.
    #[must_use]
    pub fn first_image(&self) -> Option<(&[u8], &str)> {
        self.parts.iter().find_map(|part| match part {
            ResponsePart::Image { data, mime_type } => Some((data.as_slice(), mime_type.as_str())),
            ResponsePart::Text(_) => None,
        })
    }

    /// All text parts joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::Text(t) => Some(t.as_str()),
                ResponsePart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Boxed future type returned by [`ImageGenerator::generate`].
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GenerationResponse, AdError>> + Send + 'a>>;

/// Generates images from an instruction and input images via an external API.
pub trait ImageGenerator: Send + Sync {
    /// Generate a response for the given request.
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_>;
}

/// Serde helper for serializing `Vec<u8>` as base64 strings in cassettes.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as base64 string.
    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        serializer.serialize_str(&encoded)
    }

    /// Deserialize base64 string to bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
