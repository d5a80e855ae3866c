//! Image source port: resolve a locator to raw bytes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::error::AdError;

/// Where a locator points, decided purely by its syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A local filesystem path (`./…` or `/…`).
    Local(PathBuf),
    /// An object in a bucket (`s3://bucket/key` or an `s3.amazonaws.com` URL).
    ObjectStore {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
    /// Any other URL, fetched with HTTP GET.
    Http(String),
}

/// Classify a locator string.
///
/// Rules, first match wins: `./` or `/` prefix is local; `s3://bucket/key` is
/// an object; a URL containing `s3.amazonaws.com`, or whose host is a regional
/// `s3.<region>.amazonaws.com` endpoint, is an object (bucket from a
/// virtual-hosted host, else the first path segment); anything else is HTTP.
#[must_use]
pub fn classify_locator(locator: &str) -> Locator {
    if locator.starts_with("./") || locator.starts_with('/') {
        return Locator::Local(PathBuf::from(locator));
    }

    if let Some(rest) = locator.strip_prefix("s3://") {
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        return Locator::ObjectStore { bucket: bucket.to_string(), key: key.to_string() };
    }

    if let Some(found) = parse_s3_url(locator) {
        return found;
    }

    Locator::Http(locator.to_string())
}

/// True for `s3.amazonaws.com`, `s3.<region>.amazonaws.com`, `s3-<region>.amazonaws.com`
/// and their virtual-hosted `<bucket>.` forms.
fn is_s3_host(host: &str) -> bool {
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split_once(':').map_or(host, |(h, _)| h);
    host.ends_with(".amazonaws.com")
        && (host.starts_with("s3.")
            || host.starts_with("s3-")
            || host.contains(".s3.")
            || host.contains(".s3-"))
}

/// Split an S3 endpoint URL into bucket and key; `None` for any other host.
fn parse_s3_url(url: &str) -> Option<Locator> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let without_query = without_scheme.split(['?', '#']).next().unwrap_or(without_scheme);
    let (host, path) = without_query.split_once('/').unwrap_or((without_query, ""));
    if !is_s3_host(host) && !url.contains("s3.amazonaws.com") {
        return None;
    }

    // Virtual-hosted: bucket.s3.region.amazonaws.com/key
    if let Some(idx) = host.find(".s3.").or_else(|| host.find(".s3-")) {
        let bucket = &host[..idx];
        if !bucket.is_empty() {
            return Some(Locator::ObjectStore { bucket: bucket.to_string(), key: path.to_string() });
        }
    }

    // Path-style: s3.region.amazonaws.com/bucket/key
    let (bucket, key) = path.split_once('/')?;
    if bucket.is_empty() {
        return None;
    }
    Some(Locator::ObjectStore { bucket: bucket.to_string(), key: key.to_string() })
}

/// Boxed future type returned by [`ImageSource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, AdError>> + Send + 'a>>;

/// Fetches raw image bytes for a locator.
pub trait ImageSource: Send + Sync {
    /// Fetch the bytes behind `locator`.
    fn fetch(&self, locator: &str) -> FetchFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(bucket: &str, key: &str) -> Locator {
        Locator::ObjectStore { bucket: bucket.into(), key: key.into() }
    }

    #[test]
    fn local_paths() {
        assert_eq!(classify_locator("./ad.png"), Locator::Local(PathBuf::from("./ad.png")));
        assert_eq!(classify_locator("/tmp/ad.png"), Locator::Local(PathBuf::from("/tmp/ad.png")));
    }

    #[test]
    fn s3_scheme() {
        assert_eq!(classify_locator("s3://ads/in/hero.jpg"), object("ads", "in/hero.jpg"));
    }

    #[test]
    fn virtual_hosted_s3_url() {
        assert_eq!(
            classify_locator(
                "https://hackathon-team1.s3.us-east-2.amazonaws.com/ad_templates/facebook/fb_1.png"
            ),
            object("hackathon-team1", "ad_templates/facebook/fb_1.png")
        );
    }

    #[test]
    fn path_style_s3_url() {
        assert_eq!(
            classify_locator("https://s3.amazonaws.com/ads/hero.jpg?versionId=3"),
            object("ads", "hero.jpg")
        );
    }

    #[test]
    fn regional_path_style_and_dash_endpoints() {
        assert_eq!(
            classify_locator("https://s3.us-east-2.amazonaws.com/hackathon-team1/creatives/a.jpg"),
            object("hackathon-team1", "creatives/a.jpg")
        );
        assert_eq!(
            classify_locator("https://ads.s3-eu-west-1.amazonaws.com/hero.jpg"),
            object("ads", "hero.jpg")
        );
    }

    #[test]
    fn everything_else_is_http() {
        assert_eq!(
            classify_locator("https://cdn.example.com/hero.jpg"),
            Locator::Http("https://cdn.example.com/hero.jpg".into())
        );
        // Relative paths without ./ are not treated as local.
        assert_eq!(classify_locator("hero.jpg"), Locator::Http("hero.jpg".into()));
    }
}
