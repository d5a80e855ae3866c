//! Live object store adapter speaking plain HTTP `GET`/`PUT`.
//!
//! Requests are unsigned apart from an optional bearer token, so the bucket
//! must accept them (public-write policy, presigning proxy, or an
//! S3-compatible gateway).

use std::time::Duration;

use reqwest::Client;

use crate::config::StorageConfig;
use crate::error::AdError;
use crate::ports::object_store::{GetFuture, ObjectStore, PutFuture};

/// Object store reached over HTTP.
pub struct HttpObjectStore {
    client: Client,
    endpoint: Option<String>,
    region: String,
    token: Option<String>,
}

impl HttpObjectStore {
    /// Create a store from storage settings; requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StorageConfig, timeout: Duration) -> Result<Self, AdError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
            token: config.token(),
        })
    }

    /// URL of `bucket`/`key`: path-style under an explicit endpoint, else
    /// virtual-hosted S3.
    #[must_use]
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match &self.endpoint {
            Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
            None => format!("https://{bucket}.s3.{}.amazonaws.com/{key}", self.region),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn put<'a>(&'a self, bucket: &'a str, key: &'a str, data: Vec<u8>, content_type: &'a str) -> PutFuture<'a> {
        Box::pin(async move {
            let url = self.object_url(bucket, key);
            let response = self
                .authorize(self.client.put(&url))
                .header("Content-Type", content_type)
                .body(data)
                .send()
                .await
                .map_err(|e| AdError::Persist(format!("Upload to {url} failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AdError::Persist(format!("Upload to {url} failed: HTTP {status} {body}")));
            }
            Ok(url)
        })
    }

    fn get<'a>(&'a self, bucket: &'a str, key: &'a str) -> GetFuture<'a> {
        Box::pin(async move {
            let url = self.object_url(bucket, key);
            let response = self.authorize(self.client.get(&url)).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(AdError::Api { status: status.as_u16(), message: format!("GET {url}") });
            }
            Ok(response.bytes().await?.to_vec())
        })
    }
}
