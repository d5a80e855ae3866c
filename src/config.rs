//! Configuration file loading with environment variable overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::{PlatformCatalog, TemplateCatalog};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// API key configuration.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Image generator settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Remote fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Variant rendering settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Object store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Platform identifier → `"WIDTHxHEIGHT"` sizes. Empty means the built-in catalog.
    #[serde(default)]
    pub platforms: BTreeMap<String, Vec<String>>,

    /// Ad templates by platform, dimension and version.
    #[serde(default)]
    pub templates: TemplateCatalog,
}

/// API key configuration.
#[derive(Debug, Default, Deserialize)]
pub struct KeysConfig {
    /// Gemini API key.
    pub gemini: Option<String>,
    /// `OpenAI` API key.
    pub openai: Option<String>,
}

/// Image generator settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model name or alias.
    pub model: String,
    /// Seconds before a generation call is abandoned.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { model: "nano-banana".to_string(), timeout_secs: 120 }
    }
}

impl GenerationConfig {
    /// Generation timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Remote fetch settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Seconds before a network fetch is abandoned.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl FetchConfig {
    /// Fetch timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Variant rendering settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// JPEG quality for distributable variants (1-100).
    pub jpeg_quality: u8,
    /// Maximum number of variants rendered at once.
    pub workers: usize,
    /// Deadline in seconds for a whole fan-out request.
    pub request_timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85, workers: 4, request_timeout_secs: 300 }
    }
}

impl RenderConfig {
    /// Fan-out deadline as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Object store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit endpoint; objects live at `{endpoint}/{bucket}/{key}`.
    pub endpoint: Option<String>,
    /// Region used to build the default virtual-hosted endpoint.
    pub region: String,
    /// Bucket for uploads. Uploads are unavailable without one.
    pub bucket: Option<String>,
    /// Prefix prepended to every uploaded key.
    pub key_prefix: String,
    /// Bearer token sent with object store requests.
    pub token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-2".to_string(),
            bucket: None,
            key_prefix: "creatives".to_string(),
            token: None,
        }
    }
}

impl StorageConfig {
    /// Get the storage token, preferring environment variable.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        std::env::var("ADCRAFT_STORAGE_TOKEN").ok().or_else(|| self.token.clone())
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// Build the platform catalog, falling back to the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured size is not `WIDTHxHEIGHT`.
    pub fn platform_catalog(&self) -> Result<PlatformCatalog, String> {
        if self.platforms.is_empty() {
            Ok(PlatformCatalog::default())
        } else {
            PlatformCatalog::from_raw(&self.platforms)
        }
    }

    /// Get the Gemini API key, preferring environment variable.
    #[must_use]
    pub fn gemini_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY").ok().or_else(|| self.keys.gemini.clone())
    }

    /// Get the `OpenAI` API key, preferring environment variable.
    #[must_use]
    pub fn openai_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY").ok().or_else(|| self.keys.openai.clone())
    }
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `ADCRAFT_CONFIG` environment variable
/// 3. `~/.config/adcraft/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("ADCRAFT_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

/// Default config path: `~/.config/adcraft/config.toml`.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/adcraft/config.toml")
    } else {
        PathBuf::from("adcraft.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DimensionSpec;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.keys.gemini.is_none());
        assert_eq!(config.generation.model, "nano-banana");
        assert_eq!(config.generation.timeout(), Duration::from_secs(120));
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.render.jpeg_quality, 85);
        assert_eq!(config.render.workers, 4);
        assert_eq!(config.storage.key_prefix, "creatives");
        assert!(config.storage.bucket.is_none());
        assert!(config.templates.is_empty());
    }

    #[test]
    fn load_nonexistent_returns_defaults() {
        let config = Config::load(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.generation.model, "nano-banana");
        assert!(config.platform_catalog().unwrap().get("Facebook").is_some());
    }

    #[test]
    fn load_valid_toml() {
        let dir = std::env::temp_dir().join("adcraft_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
[keys]
gemini = "test-gemini-key"

[generation]
model = "gpt-1"
timeout_secs = 10

[render]
workers = 2

[storage]
bucket = "ads"
region = "eu-west-1"

[platforms]
Pinterest = ["1000x1500"]

[templates.instagram."1080x1920".version1]
url = "s3://ads/templates/ig_1080_1920_1.png"
left = 80
top = 300
right = 480
bottom = 1000
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.keys.gemini.as_deref(), Some("test-gemini-key"));
        assert_eq!(config.generation.model, "gpt-1");
        assert_eq!(config.generation.timeout_secs, 10);
        assert_eq!(config.render.workers, 2);
        // Unset fields in a present table keep their defaults.
        assert_eq!(config.render.jpeg_quality, 85);
        assert_eq!(config.storage.bucket.as_deref(), Some("ads"));
        assert_eq!(config.storage.key_prefix, "creatives");

        let catalog = config.platform_catalog().unwrap();
        assert_eq!(catalog.get("Pinterest").unwrap(), &[DimensionSpec { width: 1000, height: 1500 }]);
        assert!(catalog.get("Facebook").is_none());

        let entry = &config.templates["instagram"]["1080x1920"]["version1"];
        assert_eq!(entry.top, 300);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_invalid_toml() {
        let dir = std::env::temp_dir().join("adcraft_config_bad_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        assert!(Config::load(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bad_platform_size_is_config_error() {
        let config: Config = toml::from_str("[platforms]\nGoogle = [\"125*125\"]\n").unwrap();
        assert!(config.platform_catalog().is_err());
    }

    #[test]
    fn discover_explicit_path() {
        let path = discover_config_path(Some("/tmp/my-config.toml"));
        assert_eq!(path, PathBuf::from("/tmp/my-config.toml"));
    }
}
