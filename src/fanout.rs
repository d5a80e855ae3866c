//! Crop fan-out: one source image, many platform variants.
//!
//! The source is fetched and decoded once, then every (platform, dimension)
//! pair is rendered and persisted by a bounded pool of workers. A failing
//! variant is reported with its reason and never stops its siblings. The whole
//! request shares one deadline: a variant whose render is still running when
//! it passes is reported as failed, and a destination still being written is
//! recorded as failed for that destination only.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use crate::catalog::{plan, unsupported, DimensionSpec, PlatformCatalog};
use crate::config::RenderConfig;
use crate::error::AdError;
use crate::imaging::{crop, encode, OutputFormat, SourceImage};
use crate::ports::ImageSource;
use crate::sink::{AssetSink, Destinations, PersistResult, RenderedVariant};

/// A request to render one source into platform variants.
#[derive(Debug, Clone)]
pub struct VariantRequest {
    /// Source image locator.
    pub source: String,
    /// Platform identifiers, case-sensitive.
    pub platforms: Vec<String>,
    /// Where each variant goes.
    pub destinations: Destinations,
}

/// Aggregate result of a fan-out request.
#[derive(Debug, Serialize)]
pub struct VariantReport {
    /// Source image locator.
    pub source: String,
    /// Decoded source width.
    pub source_width: u32,
    /// Decoded source height.
    pub source_height: u32,
    /// Length of the fetched source bytes.
    pub source_bytes: usize,
    /// Sizes planned per supported platform.
    pub plan: BTreeMap<String, Vec<DimensionSpec>>,
    /// Requested identifiers the catalog does not know.
    pub unsupported: Vec<String>,
    /// One entry per planned variant, in plan order.
    pub variants: Vec<VariantOutcome>,
    /// Wall-clock time for the whole request.
    pub elapsed_ms: u128,
}

/// Result for one (platform, dimension) pair.
#[derive(Debug, Serialize)]
pub struct VariantOutcome {
    /// Platform identifier.
    pub platform: String,
    /// Target size.
    pub dimension: DimensionSpec,
    /// Rendered or failed.
    #[serde(flatten)]
    pub status: VariantStatus,
}

/// Whether a variant was produced.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VariantStatus {
    /// Encoded and handed to the sink.
    Rendered {
        /// Encoding used.
        format: OutputFormat,
        /// Encoded size in bytes.
        byte_len: usize,
        /// Per-destination results.
        destinations: Vec<PersistResult>,
    },
    /// Rendering or encoding failed, or the deadline passed.
    Failed {
        /// Why.
        reason: String,
    },
}

/// Runs crop fan-out requests against injected capabilities.
pub struct VariantPipeline {
    source: Arc<dyn ImageSource>,
    sink: Arc<AssetSink>,
    catalog: Arc<PlatformCatalog>,
    render: RenderConfig,
}

impl VariantPipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(
        source: Arc<dyn ImageSource>,
        sink: Arc<AssetSink>,
        catalog: Arc<PlatformCatalog>,
        render: RenderConfig,
    ) -> Self {
        Self { source, sink, catalog, render }
    }

    /// Fetch, decode, render every planned variant, and persist each one.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::Validation`] for a malformed request,
    /// [`AdError::Fetch`] if the source cannot be fetched or decoded, and
    /// [`AdError::Timeout`] if fetching outlives the request deadline.
    /// Per-variant failures are reported inside the [`VariantReport`].
    pub async fn run(&self, request: &VariantRequest) -> Result<VariantReport, AdError> {
        validate(request)?;
        let started = Instant::now();
        let budget = self.render.request_timeout();
        let deadline = tokio::time::Instant::now() + budget;

        let planned = plan(&self.catalog, &request.platforms);
        let skipped = unsupported(&self.catalog, &request.platforms);
        if !skipped.is_empty() {
            let known: Vec<&str> = self.catalog.platforms().collect();
            info!(platforms = ?skipped, ?known, "skipping unsupported platforms");
        }

        let bytes = timeout_at(deadline, self.source.fetch(&request.source))
            .await
            .map_err(|_| AdError::Timeout(budget))??;
        let source = tokio::task::spawn_blocking(move || SourceImage::decode(&bytes))
            .await
            .map_err(|e| AdError::Fetch(format!("Decode task failed: {e}")))?
            .map_err(|e| AdError::Fetch(format!("Source {} is not a usable image: {e}", request.source)))?;
        let source_bytes = source.byte_len();
        let source = Arc::new(source);
        info!(
            source = %request.source,
            width = source.width(),
            height = source.height(),
            bytes = source_bytes,
            "decoded source"
        );

        let jobs: Vec<(usize, String, DimensionSpec)> = planned
            .iter()
            .flat_map(|(platform, dims)| dims.iter().map(move |d| (platform.clone(), *d)))
            .enumerate()
            .map(|(i, (platform, dim))| (i, platform, dim))
            .collect();

        let mut outcomes: Vec<(usize, VariantOutcome)> = stream::iter(jobs)
            .map(|(i, platform, dimension)| {
                let source = Arc::clone(&source);
                let destinations = &request.destinations;
                async move {
                    let status = self.render_one(source, &platform, dimension, destinations, deadline).await;
                    (i, VariantOutcome { platform, dimension, status })
                }
            })
            .buffer_unordered(self.render.workers.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(i, _)| *i);

        Ok(VariantReport {
            source: request.source.clone(),
            source_width: source.width(),
            source_height: source.height(),
            source_bytes,
            plan: planned,
            unsupported: skipped,
            variants: outcomes.into_iter().map(|(_, o)| o).collect(),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    async fn render_one(
        &self,
        source: Arc<SourceImage>,
        platform: &str,
        dimension: DimensionSpec,
        destinations: &Destinations,
        deadline: tokio::time::Instant,
    ) -> VariantStatus {
        let quality = self.render.jpeg_quality;
        let task = tokio::task::spawn_blocking(move || {
            let raster = crop::render(&source, dimension, OutputFormat::Jpeg);
            encode(&raster.image, raster.format, quality)
        });
        let encoded = match timeout_at(deadline, task).await {
            Ok(joined) => joined.map_err(|e| AdError::Encode(format!("Render task failed: {e}"))).and_then(|r| r),
            Err(_) => Err(AdError::Timeout(self.render.request_timeout())),
        };

        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%platform, %dimension, "variant failed: {e}");
                return VariantStatus::Failed { reason: e.to_string() };
            }
        };

        let variant = RenderedVariant {
            platform: platform.to_string(),
            dimension,
            format: OutputFormat::Jpeg,
            bytes,
        };
        let results = self.sink.persist_until(&variant, destinations, Some(deadline)).await;
        let written = results.iter().filter(|r| r.is_ok()).count();
        debug!(%platform, %dimension, bytes = variant.bytes.len(), written, of = results.len(), "variant rendered");

        VariantStatus::Rendered {
            format: variant.format,
            byte_len: variant.bytes.len(),
            destinations: results,
        }
    }
}

fn validate(request: &VariantRequest) -> Result<(), AdError> {
    if request.source.trim().is_empty() {
        return Err(AdError::Validation("Source locator is empty".to_string()));
    }
    if request.platforms.is_empty() {
        return Err(AdError::Validation("At least one platform is required".to_string()));
    }
    if request.destinations.is_empty() {
        return Err(AdError::Validation(
            "No destination selected: choose a local directory, upload, or inline".to_string(),
        ));
    }
    Ok(())
}
