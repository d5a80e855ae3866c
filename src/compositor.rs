//! Product-into-template composition: ask the generator, else overlay.
//!
//! A run moves through [`CompositionState`]s:
//!
//! ```text
//! Idle → AwaitingGeneration → ImageReceived    → Persisted         → Done
//!                           → TextOnly         → FallbackAttempted → Done
//!                           → GenerationFailed → FallbackAttempted → Done
//! ```
//!
//! Only a malformed request is returned as an error. Every run that reaches
//! the generator ends in a [`CompositionResult`], even when the fallback fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{DimensionSpec, Placeholder};
use crate::error::AdError;
use crate::imaging::{encode, overlay, OutputFormat, SourceImage};
use crate::ports::{GenerationRequest, ImageGenerator, InputImage};
use crate::sink::{AssetSink, Destinations, PersistResult, RenderedVariant};

/// Label used for composed images in file names and object keys.
const CREATIVE_LABEL: &str = "creative";

/// Inputs for one composition.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    /// Encoded product image.
    pub product: Vec<u8>,
    /// Encoded template image.
    pub template: Vec<u8>,
    /// Where the product should go, as told to the generator.
    pub placeholder: Placeholder,
    /// Custom instruction; replaces the built-in one when set.
    pub instruction: Option<String>,
}

/// Terminal status of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositionStatus {
    /// The generator produced the image.
    AiGenerated,
    /// The deterministic overlay produced the image.
    FallbackOverlay,
    /// Neither produced an image.
    Failed,
}

/// States a composition passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionState {
    /// Request accepted, not yet validated.
    Idle,
    /// Waiting on the generator.
    AwaitingGeneration,
    /// The response carried an image.
    ImageReceived,
    /// The response carried only text.
    TextOnly,
    /// The call failed, timed out, or returned an unusable image.
    GenerationFailed,
    /// The generated image was written.
    Persisted,
    /// The overlay fallback ran.
    FallbackAttempted,
    /// Finished.
    Done,
}

/// Summary of the image a composition produced.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedImage {
    /// Pixel size.
    pub dimension: DimensionSpec,
    /// Encoding.
    pub format: OutputFormat,
    /// Encoded size in bytes.
    pub byte_len: usize,
}

/// Outcome of a composition.
#[derive(Debug, Serialize)]
pub struct CompositionResult {
    /// How the run ended.
    pub status: CompositionStatus,
    /// The produced image, if any.
    pub image: Option<ComposedImage>,
    /// Per-destination results for the produced image.
    pub destinations: Vec<PersistResult>,
    /// Text parts returned by the generator.
    pub response_text: String,
    /// Generation and overlay errors, in the order they happened.
    pub errors: Vec<String>,
    /// States visited.
    pub states: Vec<CompositionState>,
    /// Time from acceptance to the terminal state.
    pub elapsed_ms: u128,
    /// Encoded output, kept out of the JSON report.
    #[serde(skip)]
    pub rendered: Option<RenderedVariant>,
}

/// Generator settings for the compositor.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Resolved model identifier.
    pub model: String,
    /// Give up on the generator after this long.
    pub timeout: Duration,
}

/// Build the built-in instruction for a placeholder.
#[must_use]
pub fn default_instruction(placeholder: &Placeholder) -> String {
    format!(
        "The first image is a product photo and the second image is an advertising template. \
         Place the product into the template inside the rectangle whose top-left corner is at \
         ({left}, {top}) and bottom-right corner is at ({right}, {bottom}) in pixels. Scale the \
         product to fit that rectangle while keeping its proportions, match the template's \
         lighting, and leave every other part of the template (text, logos, colors, layout) \
         unchanged. Return the finished ad as a single image at the template's size.",
        left = placeholder.left,
        top = placeholder.top,
        right = placeholder.right,
        bottom = placeholder.bottom,
    )
}

/// What came back from the generator, reduced to what the state machine needs.
enum Generated {
    Image(SourceImage),
    TextOnly,
    Failed(String),
}

/// Composes products into templates.
pub struct Compositor {
    generator: Arc<dyn ImageGenerator>,
    sink: Arc<AssetSink>,
    config: CompositorConfig,
}

impl Compositor {
    /// Create a compositor.
    #[must_use]
    pub fn new(generator: Arc<dyn ImageGenerator>, sink: Arc<AssetSink>, config: CompositorConfig) -> Self {
        Self { generator, sink, config }
    }

    /// Run one composition.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::Validation`] if either image is missing or not
    /// decodable, the placeholder is empty, or no destination is selected.
    /// Nothing is generated in that case.
    pub async fn compose(
        &self,
        request: &CompositionRequest,
        destinations: &Destinations,
    ) -> Result<CompositionResult, AdError> {
        let started = Instant::now();
        let mut states = vec![CompositionState::Idle];
        let (product, template) = validate(request, destinations).await?;

        states.push(CompositionState::AwaitingGeneration);
        let mut response_text = String::new();
        let mut errors = Vec::new();

        let generated = self.generate(request, &mut response_text).await;
        let outcome = match generated {
            Generated::Image(image) => {
                states.push(CompositionState::ImageReceived);
                match encode_output(image).await {
                    Ok(variant) => Ok(variant),
                    Err(e) => {
                        warn!("generated image could not be re-encoded: {e}");
                        states.push(CompositionState::GenerationFailed);
                        Err(e.to_string())
                    }
                }
            }
            Generated::TextOnly => {
                states.push(CompositionState::TextOnly);
                Err("Generator returned no image".to_string())
            }
            Generated::Failed(reason) => {
                states.push(CompositionState::GenerationFailed);
                Err(reason)
            }
        };

        let (status, rendered) = match outcome {
            Ok(variant) => (CompositionStatus::AiGenerated, Some(variant)),
            Err(reason) => {
                info!("falling back to overlay: {reason}");
                errors.push(reason);
                states.push(CompositionState::FallbackAttempted);
                match fallback(product, template).await {
                    Ok(variant) => (CompositionStatus::FallbackOverlay, Some(variant)),
                    Err(e) => {
                        warn!("overlay fallback failed: {e}");
                        errors.push(e.to_string());
                        (CompositionStatus::Failed, None)
                    }
                }
            }
        };

        let destinations = match &rendered {
            Some(variant) => {
                let results = self.sink.persist(variant, destinations).await;
                if status == CompositionStatus::AiGenerated {
                    states.push(CompositionState::Persisted);
                }
                results
            }
            None => Vec::new(),
        };
        states.push(CompositionState::Done);

        let elapsed = started.elapsed();
        info!(status = ?status, elapsed_ms = elapsed.as_millis(), "composition finished");

        Ok(CompositionResult {
            status,
            image: rendered.as_ref().map(|v| ComposedImage {
                dimension: v.dimension,
                format: v.format,
                byte_len: v.bytes.len(),
            }),
            destinations,
            response_text,
            errors,
            states,
            elapsed_ms: elapsed.as_millis(),
            rendered,
        })
    }

    /// Call the generator under the timeout and classify the response.
    async fn generate(&self, request: &CompositionRequest, response_text: &mut String) -> Generated {
        let instruction = request
            .instruction
            .clone()
            .unwrap_or_else(|| default_instruction(&request.placeholder));
        let generation = GenerationRequest {
            model: self.config.model.clone(),
            instruction,
            images: vec![input_image(&request.product), input_image(&request.template)],
        };

        debug!(model = %generation.model, "awaiting generation");
        let response = match tokio::time::timeout(self.config.timeout, self.generator.generate(&generation)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Generated::Failed(e.to_string()),
            Err(_) => return Generated::Failed(AdError::Timeout(self.config.timeout).to_string()),
        };

        *response_text = response.text();
        let Some((data, mime_type)) = response.first_image() else {
            return Generated::TextOnly;
        };
        debug!(%mime_type, bytes = data.len(), "image received");
        match SourceImage::decode(data) {
            Ok(image) => Generated::Image(image),
            Err(e) => Generated::Failed(format!("Generated image is unusable: {e}")),
        }
    }
}

async fn validate(
    request: &CompositionRequest,
    destinations: &Destinations,
) -> Result<(SourceImage, SourceImage), AdError> {
    if request.product.is_empty() {
        return Err(AdError::Validation("Product image is missing".to_string()));
    }
    if request.template.is_empty() {
        return Err(AdError::Validation("Template image is missing".to_string()));
    }
    request.placeholder.validate().map_err(AdError::Validation)?;
    if destinations.is_empty() {
        return Err(AdError::Validation("No destination selected".to_string()));
    }

    let product = request.product.clone();
    let template = request.template.clone();
    tokio::task::spawn_blocking(move || {
        let product = SourceImage::decode(&product)
            .map_err(|e| AdError::Validation(format!("Product image: {e}")))?;
        let template = SourceImage::decode(&template)
            .map_err(|e| AdError::Validation(format!("Template image: {e}")))?;
        Ok((product, template))
    })
    .await
    .map_err(|e| AdError::Validation(format!("Decode task failed: {e}")))?
}

fn input_image(data: &[u8]) -> InputImage {
    let mime_type = image::guess_format(data)
        .map_or("application/octet-stream", |f| f.to_mime_type())
        .to_string();
    InputImage { data: data.to_vec(), mime_type }
}

async fn encode_output(image: SourceImage) -> Result<RenderedVariant, AdError> {
    tokio::task::spawn_blocking(move || {
        let bytes = encode(image.image(), OutputFormat::Png, 100)?;
        Ok(RenderedVariant {
            platform: CREATIVE_LABEL.to_string(),
            dimension: DimensionSpec { width: image.width(), height: image.height() },
            format: OutputFormat::Png,
            bytes,
        })
    })
    .await
    .map_err(|e| AdError::Encode(format!("Encode task failed: {e}")))?
}

async fn fallback(product: SourceImage, template: SourceImage) -> Result<RenderedVariant, AdError> {
    let composed = tokio::task::spawn_blocking(move || overlay(&product, &template))
        .await
        .map_err(|e| AdError::Encode(format!("Overlay task failed: {e}")))??;
    encode_output(composed).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::ports::image_generator::{GenerateFuture, GenerationResponse, ResponsePart};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Respond(Vec<ResponsePart>),
        Fail,
        Hang,
    }

    struct MockGenerator {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockGenerator {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self { behavior, calls: AtomicUsize::new(0) })
        }
    }

    impl ImageGenerator for MockGenerator {
        fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.images.len(), 2);
            Box::pin(async move {
                match &self.behavior {
                    Behavior::Respond(parts) => Ok(GenerationResponse { parts: parts.clone() }),
                    Behavior::Fail => Err(AdError::Api { status: 503, message: "overloaded".into() }),
                    Behavior::Hang => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok(GenerationResponse::default())
                    }
                }
            })
        }
    }

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        encode(&img, OutputFormat::Png, 100).unwrap()
    }

    fn request() -> CompositionRequest {
        CompositionRequest {
            product: png(40, 30, [0, 0, 255]),
            template: png(120, 120, [255, 0, 0]),
            placeholder: Placeholder { left: 10, top: 10, right: 60, bottom: 60 },
            instruction: None,
        }
    }

    fn compositor(generator: Arc<MockGenerator>, timeout: Duration) -> Compositor {
        Compositor::new(
            generator,
            Arc::new(AssetSink::new(None, &StorageConfig::default())),
            CompositorConfig { model: "test-model".into(), timeout },
        )
    }

    fn inline() -> Destinations {
        Destinations { inline: true, ..Destinations::default() }
    }

    fn expected_overlay(request: &CompositionRequest) -> Vec<u8> {
        let product = SourceImage::decode(&request.product).unwrap();
        let template = SourceImage::decode(&request.template).unwrap();
        let composed = overlay(&product, &template).unwrap();
        encode(composed.image(), OutputFormat::Png, 100).unwrap()
    }

    #[tokio::test]
    async fn first_generated_image_is_used() {
        let generator = MockGenerator::new(Behavior::Respond(vec![
            ResponsePart::Text("done".into()),
            ResponsePart::Image { data: png(64, 48, [0, 255, 0]), mime_type: "image/png".into() },
            ResponsePart::Image { data: png(8, 8, [0, 0, 0]), mime_type: "image/png".into() },
        ]));
        let result = compositor(generator, Duration::from_secs(5)).compose(&request(), &inline()).await.unwrap();

        assert_eq!(result.status, CompositionStatus::AiGenerated);
        let image = result.image.unwrap();
        assert_eq!(image.dimension, DimensionSpec { width: 64, height: 48 });
        assert_eq!(image.format, OutputFormat::Png);
        assert_eq!(result.response_text, "done");
        assert!(result.destinations[0].is_ok());
        assert_eq!(
            result.states,
            vec![
                CompositionState::Idle,
                CompositionState::AwaitingGeneration,
                CompositionState::ImageReceived,
                CompositionState::Persisted,
                CompositionState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn text_only_response_falls_back_to_overlay() {
        let generator = MockGenerator::new(Behavior::Respond(vec![ResponsePart::Text(
            "I cannot edit this image".into(),
        )]));
        let req = request();
        let result = compositor(generator, Duration::from_secs(5)).compose(&req, &inline()).await.unwrap();

        assert_eq!(result.status, CompositionStatus::FallbackOverlay);
        assert_eq!(result.response_text, "I cannot edit this image");
        assert_eq!(result.image.as_ref().unwrap().dimension, DimensionSpec { width: 120, height: 120 });
        assert_eq!(result.rendered.unwrap().bytes, expected_overlay(&req));
        assert_eq!(
            result.states,
            vec![
                CompositionState::Idle,
                CompositionState::AwaitingGeneration,
                CompositionState::TextOnly,
                CompositionState::FallbackAttempted,
                CompositionState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn generator_error_falls_back_to_overlay() {
        let generator = MockGenerator::new(Behavior::Fail);
        let result = compositor(generator, Duration::from_secs(5)).compose(&request(), &inline()).await.unwrap();

        assert_eq!(result.status, CompositionStatus::FallbackOverlay);
        assert!(result.errors[0].contains("overloaded"), "{:?}", result.errors);
        assert!(result.states.contains(&CompositionState::GenerationFailed));
    }

    #[tokio::test]
    async fn hung_generator_times_out_then_falls_back() {
        let generator = MockGenerator::new(Behavior::Hang);
        let started = Instant::now();
        let result = compositor(generator, Duration::from_millis(100)).compose(&request(), &inline()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.status, CompositionStatus::FallbackOverlay);
        assert!(result.states.contains(&CompositionState::GenerationFailed));
        assert!(result.errors[0].contains("Timed out"), "{:?}", result.errors);
    }

    #[tokio::test]
    async fn unusable_generated_image_falls_back() {
        let generator = MockGenerator::new(Behavior::Respond(vec![ResponsePart::Image {
            data: b"not a png".to_vec(),
            mime_type: "image/png".into(),
        }]));
        let result = compositor(generator, Duration::from_secs(5)).compose(&request(), &inline()).await.unwrap();
        assert_eq!(result.status, CompositionStatus::FallbackOverlay);
        assert!(result.states.contains(&CompositionState::GenerationFailed));
    }

    #[tokio::test]
    async fn failed_overlay_reports_both_errors() {
        let generator = MockGenerator::new(Behavior::Respond(vec![ResponsePart::Text("no".into())]));
        let mut req = request();
        // Too narrow for a quarter-width product.
        req.template = png(3, 120, [255, 0, 0]);
        let result = compositor(generator, Duration::from_secs(5)).compose(&req, &inline()).await.unwrap();

        assert_eq!(result.status, CompositionStatus::Failed);
        assert!(result.image.is_none());
        assert!(result.destinations.is_empty());
        assert_eq!(result.response_text, "no");
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.states.last(), Some(&CompositionState::Done));
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_generator() {
        let generator = MockGenerator::new(Behavior::Fail);
        let c = compositor(generator.clone(), Duration::from_secs(5));

        let mut req = request();
        req.product = b"garbage".to_vec();
        assert!(matches!(c.compose(&req, &inline()).await, Err(AdError::Validation(_))));

        let mut req = request();
        req.template.clear();
        assert!(matches!(c.compose(&req, &inline()).await, Err(AdError::Validation(_))));

        assert!(matches!(c.compose(&request(), &Destinations::default()).await, Err(AdError::Validation(_))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_instruction_mentions_rectangle() {
        let text = default_instruction(&Placeholder { left: 19, top: 266, right: 419, bottom: 815 });
        assert!(text.contains("(19, 266)"));
        assert!(text.contains("(419, 815)"));
    }

    #[test]
    fn input_image_sniffs_mime() {
        assert_eq!(input_image(&png(2, 2, [0, 0, 0])).mime_type, "image/png");
    }
}
