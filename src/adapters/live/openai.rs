//! Live adapter for the `OpenAI` image edits API.

use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::error::AdError;
use crate::ports::image_generator::{
    GenerateFuture, GenerationRequest, GenerationResponse, ImageGenerator, ResponsePart,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/images/edits";

/// Live `OpenAI` image generator that calls the `OpenAI` image edits API.
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
}

impl OpenAiGenerator {
    /// Create a new `OpenAI` generator with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }
}

impl ImageGenerator for OpenAiGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let mut form = Form::new()
                .text("model", request.model.clone())
                .text("prompt", request.instruction.clone())
                .text("output_format", "png");

            for (i, image) in request.images.into_iter().enumerate() {
                let ext = image.mime_type.strip_prefix("image/").unwrap_or("png").to_string();
                let part = Part::bytes(image.data)
                    .file_name(format!("input-{i}.{ext}"))
                    .mime_str(&image.mime_type)?;
                form = form.part("image[]", part);
            }

            let response = self
                .client
                .post(OPENAI_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .multipart(form)
                .send()
                .await?;

            let status = response.status();
            let response_text = response.text().await?;

            if !status.is_success() {
                return Err(AdError::Api { status: status.as_u16(), message: response_text });
            }

            let parsed: OpenAiResponse = serde_json::from_str(&response_text).map_err(|e| {
                AdError::Api { status: 200, message: format!("Failed to parse response: {e}") }
            })?;

            let mut parts = Vec::new();
            for item in parsed.data {
                if let Some(text) = item.revised_prompt {
                    parts.push(ResponsePart::Text(text));
                }
                if let Some(b64) = item.b64_json {
                    let data = base64::engine::general_purpose::STANDARD.decode(&b64).map_err(|e| {
                        AdError::Api { status: 200, message: format!("Failed to decode base64: {e}") }
                    })?;
                    parts.push(ResponsePart::Image { data, mime_type: "image/png".to_string() });
                }
            }

            Ok(GenerationResponse { parts })
        })
    }
}

// --- OpenAI API response types ---

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    data: Vec<OpenAiImageData>,
}

#[derive(Deserialize)]
struct OpenAiImageData {
    b64_json: Option<String>,
    revised_prompt: Option<String>,
}
