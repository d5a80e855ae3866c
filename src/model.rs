//! Generator model aliases and provider detection.

use std::fmt;

/// Image generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Google Gemini `generateContent`.
    Gemini,
    /// `OpenAI` image edits.
    OpenAi,
}

impl Provider {
    /// Environment variable holding this provider's API key.
    #[must_use]
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gemini => "Gemini",
            Self::OpenAi => "OpenAI",
        })
    }
}

const ALIASES: &[(&str, &str)] = &[
    ("nano-banana", "gemini-3.1-flash-image-preview"),
    ("nano-banana-pro", "gemini-3-pro-image-preview"),
    ("gpt-1.5", "gpt-image-1.5"),
    ("gpt-1", "gpt-image-1"),
    ("gpt-1-mini", "gpt-image-1-mini"),
];

/// Expand a short alias; anything else passes through unchanged.
#[must_use]
pub fn resolve_model(name: &str) -> String {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |&(_, full)| full)
        .to_string()
}

/// Detect the provider from a resolved model name.
///
/// # Errors
///
/// Returns an error if the model name doesn't match a known provider prefix.
pub fn detect_provider(model: &str) -> Result<Provider, String> {
    if model.starts_with("gemini") {
        Ok(Provider::Gemini)
    } else if model.starts_with("gpt-image") {
        Ok(Provider::OpenAi)
    } else {
        Err(format!("Unknown provider for model '{model}'. Expected 'gemini-*' or 'gpt-image-*'."))
    }
}
