//! Live adapter that resolves image locators to bytes.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::AdError;
use crate::ports::image_source::{classify_locator, FetchFuture, ImageSource, Locator};
use crate::ports::ObjectStore;

/// Reads local files, bucket objects, and HTTP URLs.
///
/// Network fetches are bounded by the client timeout; local and bucket reads
/// rely on the filesystem and the object store client.
pub struct LocatorSource {
    client: Client,
    store: Arc<dyn ObjectStore>,
}

impl LocatorSource {
    /// Create a source whose HTTP fetches give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, store: Arc<dyn ObjectStore>) -> Result<Self, AdError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, store })
    }
}

impl ImageSource for LocatorSource {
    fn fetch(&self, locator: &str) -> FetchFuture<'_> {
        let locator = locator.to_string();
        Box::pin(async move {
            match classify_locator(&locator) {
                Locator::Local(path) => {
                    debug!(path = %path.display(), "reading local image");
                    tokio::fs::read(&path)
                        .await
                        .map_err(|e| AdError::Fetch(format!("Failed to read {}: {e}", path.display())))
                }
                Locator::ObjectStore { bucket, key } => {
                    debug!(%bucket, %key, "reading object");
                    self.store
                        .get(&bucket, &key)
                        .await
                        .map_err(|e| AdError::Fetch(format!("Failed to read s3://{bucket}/{key}: {e}")))
                }
                Locator::Http(url) => {
                    debug!(%url, "downloading image");
                    let response = self
                        .client
                        .get(&url)
                        .send()
                        .await
                        .map_err(|e| AdError::Fetch(format!("Failed to download {url}: {e}")))?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(AdError::Fetch(format!("Failed to download {url}: HTTP {status}")));
                    }
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| AdError::Fetch(format!("Failed to download {url}: {e}")))?;
                    Ok(bytes.to_vec())
                }
            }
        })
    }
}
