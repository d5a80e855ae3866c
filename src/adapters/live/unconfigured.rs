//! Stand-in generator for a provider with no API key.
//!
//! Every call fails with [`AdError::MissingApiKey`], so compositions still
//! reach the deterministic overlay fallback instead of aborting up front.

use crate::error::AdError;
use crate::model::Provider;
use crate::ports::image_generator::{GenerateFuture, GenerationRequest, ImageGenerator};

/// Generator whose every call reports the missing key for `provider`.
pub struct UnconfiguredGenerator {
    provider: Provider,
}

impl UnconfiguredGenerator {
    /// Create a generator that always reports `provider`'s missing key.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

impl ImageGenerator for UnconfiguredGenerator {
    fn generate(&self, _request: &GenerationRequest) -> GenerateFuture<'_> {
        Box::pin(async move {
            Err(AdError::MissingApiKey {
                provider: self.provider.to_string(),
                env_var: self.provider.env_var().to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn names_the_env_var_to_set() {
        let generator = UnconfiguredGenerator::new(Provider::OpenAi);
        let request = GenerationRequest { model: "gpt-image-1".into(), instruction: "go".into(), images: Vec::new() };
        let err = generator.generate(&request).await.unwrap_err();
        assert!(matches!(err, AdError::MissingApiKey { .. }));
        assert!(err.to_string().contains("OPENAI_API_KEY"), "{err}");
    }
}
