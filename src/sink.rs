//! Persisting rendered images: file naming, local writes, uploads, inline payloads.
//!
//! Every destination is attempted on its own. A failure is recorded in that
//! destination's [`PersistResult`] and never stops the others.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde::Serialize;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::catalog::DimensionSpec;
use crate::config::StorageConfig;
use crate::error::AdError;
use crate::imaging::OutputFormat;
use crate::ports::ObjectStore;

/// An encoded rendering of one platform/dimension pair. Never mutated once built.
#[derive(Debug, Clone)]
pub struct RenderedVariant {
    /// Platform identifier (or a label such as `"creative"` for compositions).
    pub platform: String,
    /// Pixel size of the encoded image.
    pub dimension: DimensionSpec,
    /// Encoding of `bytes`.
    pub format: OutputFormat,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

impl RenderedVariant {
    /// File name used for local writes and object keys, e.g. `Facebook-1080x1080.jpg`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.{}",
            slug(&self.platform, 50, false),
            self.dimension,
            self.format.extension()
        )
    }
}

/// Kind of persistence target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationKind {
    /// Local filesystem.
    Local,
    /// Object store bucket.
    ObjectStore,
    /// Base64 data URL returned in the report.
    Inline,
}

/// Outcome of one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PersistOutcome {
    /// Written; `locator` is a path, URL, or data URL.
    Ok {
        /// Where the image can be found.
        locator: String,
    },
    /// Not written.
    Failed {
        /// Why.
        reason: String,
    },
}

/// One destination attempt for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistResult {
    /// Which destination was attempted.
    pub destination: DestinationKind,
    /// What happened.
    #[serde(flatten)]
    pub outcome: PersistOutcome,
}

impl PersistResult {
    /// Whether the destination was written.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, PersistOutcome::Ok { .. })
    }
}

/// Local write target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTarget {
    /// Write into this directory using [`RenderedVariant::file_name`].
    Dir(PathBuf),
    /// Write to exactly this path.
    File(PathBuf),
}

/// Which destinations to write for a request.
#[derive(Debug, Clone, Default)]
pub struct Destinations {
    /// Local target, if any.
    pub local: Option<LocalTarget>,
    /// Upload to the configured bucket.
    pub object_store: bool,
    /// Return a base64 data URL.
    pub inline: bool,
    /// Path segment grouping the uploads of one request.
    pub batch: String,
}

impl Destinations {
    /// True when nothing would be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local.is_none() && !self.object_store && !self.inline
    }
}

/// Writes rendered images to their destinations.
pub struct AssetSink {
    store: Option<Arc<dyn ObjectStore>>,
    bucket: Option<String>,
    key_prefix: String,
}

impl AssetSink {
    /// Create a sink. Uploads fail per-destination when `store` or the
    /// configured bucket is missing.
    #[must_use]
    pub fn new(store: Option<Arc<dyn ObjectStore>>, config: &StorageConfig) -> Self {
        Self {
            store,
            bucket: config.bucket.clone(),
            key_prefix: config.key_prefix.trim_matches('/').to_string(),
        }
    }

    /// Object key for a variant within a batch.
    #[must_use]
    pub fn object_key(&self, batch: &str, variant: &RenderedVariant) -> String {
        [self.key_prefix.as_str(), batch.trim_matches('/'), variant.file_name().as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Write `variant` to every selected destination, in the order local,
    /// object store, inline. Never fails as a whole.
    pub async fn persist(&self, variant: &RenderedVariant, destinations: &Destinations) -> Vec<PersistResult> {
        self.persist_until(variant, destinations, None).await
    }

    /// Like [`AssetSink::persist`], but each local write and upload must
    /// finish by `deadline`. A destination still writing when it passes is
    /// recorded as failed; the remaining destinations are still attempted.
    pub async fn persist_until(
        &self,
        variant: &RenderedVariant,
        destinations: &Destinations,
        deadline: Option<Instant>,
    ) -> Vec<PersistResult> {
        let mut results = Vec::new();

        if let Some(target) = &destinations.local {
            let outcome = match bounded(deadline, write_local(target, variant)).await {
                Ok(path) => PersistOutcome::Ok { locator: path.display().to_string() },
                Err(e) => failed(variant, DestinationKind::Local, &e),
            };
            results.push(PersistResult { destination: DestinationKind::Local, outcome });
        }

        if destinations.object_store {
            let outcome = match bounded(deadline, self.upload(&destinations.batch, variant)).await {
                Ok(url) => PersistOutcome::Ok { locator: url },
                Err(e) => failed(variant, DestinationKind::ObjectStore, &e),
            };
            results.push(PersistResult { destination: DestinationKind::ObjectStore, outcome });
        }

        if destinations.inline {
            results.push(PersistResult {
                destination: DestinationKind::Inline,
                outcome: PersistOutcome::Ok { locator: data_url(variant) },
            });
        }

        results
    }

    async fn upload(&self, batch: &str, variant: &RenderedVariant) -> Result<String, AdError> {
        let (Some(store), Some(bucket)) = (&self.store, &self.bucket) else {
            return Err(AdError::Persist("No object store bucket configured".to_string()));
        };
        let key = self.object_key(batch, variant);
        debug!(%bucket, %key, bytes = variant.bytes.len(), "uploading");
        store.put(bucket, &key, variant.bytes.clone(), variant.format.mime_type()).await
    }
}

async fn bounded<T>(deadline: Option<Instant>, write: impl Future<Output = Result<T, AdError>>) -> Result<T, AdError> {
    let Some(deadline) = deadline else {
        return write.await;
    };
    timeout_at(deadline, write)
        .await
        .map_err(|_| AdError::Persist("Request deadline passed before the write finished".to_string()))?
}

fn failed(variant: &RenderedVariant, kind: DestinationKind, e: &AdError) -> PersistOutcome {
    warn!(platform = %variant.platform, dimension = %variant.dimension, destination = ?kind, "persist failed: {e}");
    PersistOutcome::Failed { reason: e.to_string() }
}

async fn write_local(target: &LocalTarget, variant: &RenderedVariant) -> Result<PathBuf, AdError> {
    let path = match target {
        LocalTarget::Dir(dir) => dir.join(variant.file_name()),
        LocalTarget::File(path) => path.clone(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &variant.bytes).await?;
    debug!(path = %path.display(), "saved");
    Ok(path)
}

/// Encode a variant as a `data:` URL.
#[must_use]
pub fn data_url(variant: &RenderedVariant) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&variant.bytes);
    format!("data:{};base64,{encoded}", variant.format.mime_type())
}

/// Generate an output filename from a locator and format.
///
/// Sanitizes the file stem of the locator to kebab-case, prefixes
/// `creative-`, appends a unix timestamp, and adds the file extension.
#[must_use]
pub fn auto_filename(locator: &str, format: OutputFormat) -> String {
    let sanitized = locator_slug(locator);
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    format!("creative-{sanitized}-{timestamp}.{}", format.extension())
}

/// Filename-safe slug of a locator's file stem, ignoring any query or fragment.
#[must_use]
pub fn locator_slug(locator: &str) -> String {
    let stem = Path::new(locator.split(['?', '#']).next().unwrap_or(locator))
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_for_filename(&stem, 40)
}

/// Sanitize a string for use in a filename.
///
/// Converts to lowercase, replaces non-alphanumeric chars with hyphens,
/// collapses consecutive hyphens, and trims to max length.
#[must_use]
pub fn sanitize_for_filename(input: &str, max_len: usize) -> String {
    slug(input, max_len, true)
}

/// Shared slugging; platform names keep their case since identifiers are case-sensitive.
fn slug(input: &str, max_len: usize, lowercase: bool) -> String {
    let mut result = String::with_capacity(max_len);
    let mut last_was_hyphen = true; // Prevents leading hyphen

    for ch in input.chars().take(max_len * 2) {
        if result.len() >= max_len {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            result.push(if lowercase { ch.to_ascii_lowercase() } else { ch });
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            result.push('-');
            last_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.is_empty() {
        "image".to_string()
    } else {
        result
    }
}
