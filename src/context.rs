//! Service context that bundles all port trait objects.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::adapters::live::gemini::GeminiGenerator;
use crate::adapters::live::http_object_store::HttpObjectStore;
use crate::adapters::live::locator_source::LocatorSource;
use crate::adapters::live::openai::OpenAiGenerator;
use crate::adapters::live::unconfigured::UnconfiguredGenerator;
use crate::adapters::recording::image_generator::RecordingImageGenerator;
use crate::adapters::replaying::image_generator::ReplayingImageGenerator;
use crate::cassette::config::load_cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::Config;
use crate::error::AdError;
use crate::model::Provider;
use crate::ports::{ImageGenerator, ImageSource, ObjectStore};

/// Env var naming a cassette to replay generator calls from.
pub const REPLAY_ENV: &str = "ADCRAFT_REPLAY";
/// Env var that turns on recording when set to `1` or `true`.
pub const RECORD_ENV: &str = "ADCRAFT_REC";

const CASSETTE_DIR: &str = ".adcraft/cassettes";

/// Image fetching and object storage, shared by both pipelines.
#[derive(Clone)]
pub struct Storage {
    /// Resolves locators to bytes.
    pub source: Arc<dyn ImageSource>,
    /// Object store used for uploads and `s3://` reads.
    pub store: Arc<dyn ObjectStore>,
}

impl Storage {
    /// Live HTTP-backed storage.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn live(config: &Config) -> Result<Self, AdError> {
        let timeout = config.fetch.timeout();
        let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(&config.storage, timeout)?);
        let source = Arc::new(LocatorSource::new(timeout, Arc::clone(&store))?);
        Ok(Self { source, store })
    }
}

/// Bundles all port trait objects into a single context.
pub struct ServiceContext {
    /// Image generator port.
    pub generator: Arc<dyn ImageGenerator>,
    /// Fetch and upload ports.
    pub storage: Storage,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Finish the recording and write the cassette to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        let recorder = Arc::try_unwrap(self.recorder)
            .map_err(|_| "Recording adapter still has references".to_string())?
            .into_inner()
            .map_err(|e| format!("Recorder lock poisoned: {e}"))?;
        recorder.finish().map_err(|e| format!("Failed to write cassette: {e}"))
    }
}

impl ServiceContext {
    /// Pick live, recording, or replaying mode from the environment.
    ///
    /// Replaying never needs an API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be loaded or an HTTP client
    /// cannot be built.
    pub fn from_env(
        provider: Provider,
        config: &Config,
        product: &str,
    ) -> Result<(Self, Option<RecordingSession>), AdError> {
        if let Ok(path) = std::env::var(REPLAY_ENV) {
            info!(cassette = %path, "replaying generator calls");
            return Ok((Self::replaying(Path::new(&path), config)?, None));
        }
        let recording = std::env::var(RECORD_ENV).is_ok_and(|v| v == "1" || v == "true");
        if recording {
            info!("recording generator calls");
            let (ctx, session) = Self::recording(provider, config, product)?;
            return Ok((ctx, Some(session)));
        }
        Ok((Self::live(provider, config)?, None))
    }

    /// Create a live context for the given provider.
    ///
    /// A provider without an API key gets a generator that fails every call,
    /// so compositions fall back to the overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn live(provider: Provider, config: &Config) -> Result<Self, AdError> {
        let key = match provider {
            Provider::Gemini => config.gemini_key(),
            Provider::OpenAi => config.openai_key(),
        };
        let generator: Arc<dyn ImageGenerator> = match (provider, key) {
            (Provider::Gemini, Some(key)) => Arc::new(GeminiGenerator::new(key)),
            (Provider::OpenAi, Some(key)) => Arc::new(OpenAiGenerator::new(key)),
            (provider, None) => {
                warn!(%provider, env_var = provider.env_var(), "no API key; compositions will use the overlay fallback");
                Arc::new(UnconfiguredGenerator::new(provider))
            }
        };
        Ok(Self { generator, storage: Storage::live(config)? })
    }

    /// Wrap the live generator with a cassette recorder named after `product`.
    ///
    /// # Errors
    ///
    /// Returns an error if the live context cannot be built.
    pub fn recording(
        provider: Provider,
        config: &Config,
        product: &str,
    ) -> Result<(Self, RecordingSession), AdError> {
        let live = Self::live(provider, config)?;
        let recorder = Arc::new(Mutex::new(CassetteRecorder::for_composition(
            Path::new(CASSETTE_DIR),
            product,
            get_commit_hash(),
        )));

        let generator = Arc::new(RecordingImageGenerator::new(live.generator, Arc::clone(&recorder)));
        Ok((Self { generator, storage: live.storage }, RecordingSession { recorder }))
    }

    /// Serve generator calls from a cassette; storage stays live.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path, config: &Config) -> Result<Self, AdError> {
        let replayer = load_cassette(path).map_err(|e| AdError::Config(format!("Failed to load cassette: {e}")))?;
        let generator = Arc::new(ReplayingImageGenerator::new(Arc::new(Mutex::new(replayer))));
        Ok(Self { generator, storage: Storage::live(config)? })
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}
