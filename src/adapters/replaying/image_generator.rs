//! Replaying adapter for the `ImageGenerator` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::cassette::{GENERATE_METHOD, GENERATOR_PORT};
use crate::error::AdError;
use crate::ports::image_generator::{
    GenerateFuture, GenerationRequest, GenerationResponse, ImageGenerator,
};

/// Serves recorded generation results from a cassette.
pub struct ReplayingImageGenerator {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingImageGenerator {
    /// Create a replaying generator backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl ImageGenerator for ReplayingImageGenerator {
    fn generate(&self, _request: &GenerationRequest) -> GenerateFuture<'_> {
        let output = next_output(&self.replayer, GENERATOR_PORT, GENERATE_METHOD);
        Box::pin(async move {
            let output = output.map_err(AdError::Generation)?;
            replay_result::<GenerationResponse>(output)
                .map_err(AdError::Generation)?
                .map_err(AdError::Generation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use chrono::Utc;
    use serde_json::json;

    fn replaying(outputs: Vec<serde_json::Value>) -> ReplayingImageGenerator {
        let interactions = outputs
            .into_iter()
            .enumerate()
            .map(|(i, output)| Interaction {
                seq: u64::try_from(i).unwrap(),
                port: "image_generator".into(),
                method: "generate".into(),
                input: json!(null),
                output,
            })
            .collect();
        let cassette = Cassette { name: "t".into(), recorded_at: Utc::now(), commit: String::new(), interactions };
        ReplayingImageGenerator::new(Arc::new(Mutex::new(CassetteReplayer::new(&cassette))))
    }

    fn request() -> GenerationRequest {
        GenerationRequest { model: "m".into(), instruction: "i".into(), images: Vec::new() }
    }

    #[tokio::test]
    async fn serves_recorded_outputs_in_order() {
        let generator = replaying(vec![
            json!({"Ok": {"parts": [{"text": "first"}]}}),
            json!({"Err": "API error (503): overloaded"}),
        ]);

        let first = generator.generate(&request()).await.unwrap();
        assert_eq!(first.text(), "first");

        let second = generator.generate(&request()).await.unwrap_err();
        assert!(second.to_string().contains("overloaded"));

        let exhausted = generator.generate(&request()).await.unwrap_err();
        assert!(exhausted.to_string().contains("Cassette exhausted"));
    }

    #[tokio::test]
    async fn decodes_base64_image_parts() {
        let generator = replaying(vec![json!({"Ok": {"parts": [
            {"image": {"data": "iVBORw==", "mime_type": "image/png"}}
        ]}})]);
        let response = generator.generate(&request()).await.unwrap();
        let (data, mime) = response.first_image().unwrap();
        assert_eq!(data, &[0x89, b'P', b'N', b'G']);
        assert_eq!(mime, "image/png");
    }
}
