//! Live adapter for the Gemini image generation API.

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::error::AdError;
use crate::ports::image_generator::{
    GenerateFuture, GenerationRequest, GenerationResponse, ImageGenerator, ResponsePart,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Live Gemini image generator that calls the Google AI API.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
}

impl GeminiGenerator {
    /// Create a new Gemini generator with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }
}

impl ImageGenerator for GeminiGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let url = format!("{GEMINI_API_BASE}/{}:generateContent", request.model);

            let mut parts = vec![serde_json::json!({ "text": request.instruction })];
            for image in &request.images {
                parts.push(serde_json::json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(&image.data),
                    }
                }));
            }

            let body = serde_json::json!({
                "contents": [{ "parts": parts }],
                "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
            });

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let response_text = response.text().await?;

            if !status.is_success() {
                return Err(AdError::Api { status: status.as_u16(), message: response_text });
            }

            let parsed: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
                AdError::Api { status: 200, message: format!("Failed to parse response: {e}") }
            })?;

            let mut out = Vec::new();
            for candidate in parsed.candidates {
                let Some(content) = candidate.content else { continue };
                for part in content.parts {
                    if let Some(text) = part.text {
                        out.push(ResponsePart::Text(text));
                    }
                    if let Some(inline) = part.inline_data {
                        let data = base64::engine::general_purpose::STANDARD
                            .decode(&inline.data)
                            .map_err(|e| AdError::Api {
                                status: 200,
                                message: format!("Failed to decode base64: {e}"),
                            })?;
                        out.push(ResponsePart::Image { data, mime_type: inline.mime_type });
                    }
                }
            }

            Ok(GenerationResponse { parts: out })
        })
    }
}

// --- Gemini API response types ---

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    inline_data: Option<GeminiInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}
