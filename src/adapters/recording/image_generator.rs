//! Recording adapter for the `ImageGenerator` port.

use std::sync::{Arc, Mutex};

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::cassette::{GENERATE_METHOD, GENERATOR_PORT};
use crate::ports::image_generator::{GenerateFuture, GenerationRequest, ImageGenerator};

/// Records generation calls while delegating to an inner generator.
pub struct RecordingImageGenerator {
    inner: Arc<dyn ImageGenerator>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingImageGenerator {
    /// Wrap `inner`, appending every call to `recorder`.
    pub fn new(inner: Arc<dyn ImageGenerator>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl ImageGenerator for RecordingImageGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let request = request.clone();
        let recorder = Arc::clone(&self.recorder);

        Box::pin(async move {
            let result = self.inner.generate(&request).await;
            record_result(&recorder, GENERATOR_PORT, GENERATE_METHOD, &request, &result);
            result
        })
    }
}
