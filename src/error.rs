//! Unified error type for adcraft.

use thiserror::Error;

/// Errors that can occur while rendering or compositing creatives.
#[derive(Debug, Error)]
pub enum AdError {
    /// Malformed request, rejected before any work begins.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A source image could not be fetched or decoded.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Decode, resize, or encode failed on specific bytes.
    #[error("Encode error: {0}")]
    Encode(String),

    /// A persistence destination could not be written.
    #[error("Persist error: {0}")]
    Persist(String),

    /// The external image generator failed.
    #[error("Generation error: {0}")]
    Generation(String),

    /// An operation exceeded its time budget.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// No API key configured for the provider.
    #[error("No API key for {provider}. Set {env_var} or add it to config file.")]
    MissingApiKey {
        /// The provider name.
        provider: String,
        /// The environment variable name.
        env_var: String,
    },
}
