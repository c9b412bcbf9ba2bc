//! Image downloads backed by the image cache
//!
//! Looks an image up in the [`ImageCache`] first and only goes to the network
//! on a miss. Downloads run on the async runtime; the resulting inserts always
//! go back through the cache's single owner.

use std::collections::HashSet;
use std::io::Cursor;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use image::{ImageFormat, ImageReader};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::images::ImageCache;

/// Default timeout for a single image download
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Formats accepted into the cache
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Errors that can occur when downloading an image
#[derive(Debug, Error)]
pub enum ImageError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with something other than 200 OK
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    /// Server answered with an empty body
    #[error("Image response was empty")]
    Empty,

    /// Body is not a decodable image in an allowed format
    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

/// Checks that `data` decodes as an image in one of [`ALLOWED_FORMATS`]
pub fn validate_image(data: &[u8]) -> Result<ImageFormat, ImageError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::InvalidImage(format!("failed to read image: {}", e)))?;

    let format = reader
        .format()
        .ok_or_else(|| ImageError::InvalidImage("could not detect image format".to_string()))?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ImageError::InvalidImage(format!(
            "unsupported image format: {:?}",
            format
        )));
    }

    reader
        .decode()
        .map_err(|e| ImageError::InvalidImage(format!("failed to decode {:?}: {}", format, e)))?;

    Ok(format)
}

/// Outcome counts of a [`ImageLoader::prefetch`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    /// Already in the cache
    pub cached: usize,
    /// Downloaded and stored
    pub fetched: usize,
    /// Download failed
    pub failed: usize,
}

/// Downloads images and stores them in an [`ImageCache`]
#[derive(Debug, Clone)]
pub struct ImageLoader {
    http_client: Client,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_IMAGE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http_client }
    }

    /// Downloads `url` without consulting the cache
    ///
    /// Only bodies that decode as an image are returned, so error pages never
    /// reach the cache.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ImageError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let format = validate_image(&bytes)?;
        tracing::debug!(url, ?format, size = bytes.len(), "image downloaded");
        Ok(bytes.to_vec())
    }

    /// Returns the image for `url` from the cache, downloading and caching it on a miss
    pub async fn load(&self, cache: &mut ImageCache, url: &str) -> Result<Vec<u8>, ImageError> {
        if let Some(data) = cache.lookup(url) {
            return Ok(data);
        }

        let data = self.fetch(url).await?;
        cache.insert(url, data.clone());
        Ok(data)
    }

    /// Makes sure every URL in `urls` is cached
    ///
    /// Misses are downloaded with at most `concurrency` requests in flight and
    /// inserted once all downloads have finished. Empty and duplicate URLs are
    /// skipped.
    pub async fn prefetch(
        &self,
        cache: &mut ImageCache,
        urls: &[String],
        concurrency: usize,
    ) -> PrefetchSummary {
        let mut summary = PrefetchSummary::default();
        let mut seen = HashSet::new();
        let mut misses = Vec::new();

        for url in urls.iter().filter(|u| !u.is_empty()) {
            if !seen.insert(url.as_str()) {
                continue;
            }
            if cache.lookup(url).is_some() {
                summary.cached += 1;
            } else {
                misses.push(url.as_str());
            }
        }

        let results: Vec<(&str, Result<Vec<u8>, ImageError>)> = stream::iter(misses)
            .map(|url| async move { (url, self.fetch(url).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (url, result) in results {
            match result {
                Ok(data) => {
                    cache.insert(url, data);
                    summary.fetched += 1;
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "image download failed");
                    summary.failed += 1;
                }
            }
        }

        tracing::debug!(?summary, "image prefetch finished");
        summary
    }
}

/// Encodes a blank PNG of `size` by `size` pixels
#[cfg(test)]
pub(crate) fn png_fixture(size: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::new(size, size)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNG encoding should succeed");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::policy::{RefreshPolicy, SystemClock};
    use crate::storage::{MemoryImageStore, MemorySettingsStore};
    use httpmock::prelude::*;
    use std::sync::Arc;

    fn test_cache() -> ImageCache {
        ImageCache::open(
            Box::new(MemoryImageStore::new()),
            Arc::new(MemorySettingsStore::new()),
            Arc::new(SystemClock),
            RefreshPolicy::default(),
        )
    }

    #[test]
    fn test_validate_image_accepts_png() {
        assert_eq!(validate_image(&png_fixture(2)).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_validate_image_rejects_non_image() {
        let result = validate_image(b"<html>captive portal</html>");
        assert!(matches!(result, Err(ImageError::InvalidImage(_))));
    }

    #[test]
    fn test_validate_image_rejects_truncated_image() {
        let png = png_fixture(8);
        let result = validate_image(&png[..png.len() / 2]);
        assert!(matches!(result, Err(ImageError::InvalidImage(_))));
    }

    #[tokio::test]
    async fn test_load_miss_downloads_and_caches() {
        let server = MockServer::start_async().await;
        let png = png_fixture(2);
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/images/apam.png");
                then.status(200).body(png.clone());
            })
            .await;
        let url = server.url("/images/apam.png");
        let mut cache = test_cache();
        let loader = ImageLoader::new();

        let first = loader.load(&mut cache, &url).await.expect("load should succeed");
        let second = loader.load(&mut cache, &url).await.expect("load should succeed");

        assert_eq!(first, png);
        assert_eq!(second, first);
        assert_eq!(cache.lookup(&url), Some(first));
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_load_hit_skips_network() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/images/cached.png");
                then.status(200).body(png_fixture(3));
            })
            .await;
        let url = server.url("/images/cached.png");
        let mut cache = test_cache();
        cache.insert(&url, b"stored".to_vec());

        let data = ImageLoader::new()
            .load(&mut cache, &url)
            .await
            .expect("load should succeed");

        assert_eq!(data, b"stored".to_vec());
        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_non_ok_status_is_error_and_not_cached() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/images/missing.png");
                then.status(404).body("Not Found");
            })
            .await;
        let url = server.url("/images/missing.png");
        let mut cache = test_cache();

        let err = ImageLoader::new().load(&mut cache, &url).await.unwrap_err();

        assert!(matches!(err, ImageError::Status(404)));
        assert!(cache.lookup(&url).is_none());
    }

    #[tokio::test]
    async fn test_html_body_with_ok_status_is_error_and_not_cached() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/images/portal.png");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html>captive portal</html>");
            })
            .await;
        let url = server.url("/images/portal.png");
        let mut cache = test_cache();

        let err = ImageLoader::new().load(&mut cache, &url).await.unwrap_err();

        assert!(matches!(err, ImageError::InvalidImage(_)));
        assert!(cache.lookup(&url).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/images/empty.png");
                then.status(200);
            })
            .await;

        let err = ImageLoader::new()
            .fetch(&server.url("/images/empty.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, ImageError::Empty));
    }

    #[tokio::test]
    async fn test_prefetch_counts_cached_fetched_and_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/a.png");
                then.status(200).body(png_fixture(2));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/b.png");
                then.status(200).body(png_fixture(3));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/broken.png");
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/page.png");
                then.status(200).body("<html>not found</html>");
            })
            .await;
        let mut cache = test_cache();
        cache.insert(&server.url("/a.png"), b"old a".to_vec());
        let urls = vec![
            server.url("/a.png"),
            server.url("/b.png"),
            server.url("/b.png"),
            server.url("/broken.png"),
            server.url("/page.png"),
            String::new(),
        ];

        let summary = ImageLoader::new().prefetch(&mut cache, &urls, 2).await;

        assert_eq!(
            summary,
            PrefetchSummary {
                cached: 1,
                fetched: 1,
                failed: 2
            }
        );
        assert_eq!(cache.lookup(&server.url("/a.png")), Some(b"old a".to_vec()));
        assert_eq!(cache.lookup(&server.url("/b.png")), Some(png_fixture(3)));
        assert!(cache.lookup(&server.url("/broken.png")).is_none());
        assert!(cache.lookup(&server.url("/page.png")).is_none());
    }
}
