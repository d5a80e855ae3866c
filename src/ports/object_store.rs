//! Object store port for uploading rendered images.

use std::future::Future;
use std::pin::Pin;

use crate::error::AdError;

/// Boxed future type returned by [`ObjectStore::put`]; resolves to the object URL.
pub type PutFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AdError>> + Send + 'a>>;

/// Boxed future type returned by [`ObjectStore::get`].
pub type GetFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, AdError>> + Send + 'a>>;

/// Reads and writes objects in a bucket. Shared across variant workers, so
/// implementations must be safe for concurrent use.
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `bucket`/`key` and return a locator URL for it.
    fn put<'a>(&'a self, bucket: &'a str, key: &'a str, data: Vec<u8>, content_type: &'a str) -> PutFuture<'a>;

    /// Read the object at `bucket`/`key`.
    fn get<'a>(&'a self, bucket: &'a str, key: &'a str) -> GetFuture<'a>;
}
