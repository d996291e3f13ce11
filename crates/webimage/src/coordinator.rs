//! # Fetch Coordinator
//!
//! Single source of truth for "should we even try this URL". Sequences
//! negative-cache check → cache lookup → download → cache population, and
//! records permanently failed URLs so they are never retried within this
//! process.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheOptions, ImageCache};
use crate::downloader::{ImageFetcher, ProgressCallback};
use crate::error::DownloadError;
use crate::probe::ImageValidator;

/// Orchestrates lookup → download → populate for each request.
///
/// Concurrent fetches of the same URL are intentionally not collapsed into
/// one download; every call is its own attempt. Only the negative cache is
/// shared state between calls.
pub struct FetchCoordinator {
    cache: ImageCache,
    fetcher: Arc<dyn ImageFetcher>,
    validator: Arc<dyn ImageValidator>,
    failed_urls: RwLock<HashSet<String>>,
}

impl FetchCoordinator {
    pub fn new(
        cache: ImageCache,
        fetcher: Arc<dyn ImageFetcher>,
        validator: Arc<dyn ImageValidator>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            validator,
            failed_urls: RwLock::new(HashSet::new()),
        }
    }

    /// Fetch the image bytes for a URL, consulting the selected cache
    /// tiers first. Resolves exactly once, with either bytes or an error.
    pub async fn fetch(
        &self,
        url: &str,
        options: CacheOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<Bytes, DownloadError> {
        if self.is_failed(url) {
            debug!(url, "url is negatively cached, refusing to retry");
            return Err(DownloadError::FailedUrl(url.to_string()));
        }

        match self.cache.lookup(url, options).await {
            Ok(Some(data)) => {
                if self.validator.is_valid_image(&data) {
                    return Ok(data);
                }
                // A cached payload that no longer decodes must not be
                // served again.
                warn!(url, "cached payload failed validation, evicting");
                if let Err(e) = self.cache.remove(url, options).await {
                    warn!(url, error = %e, "failed to evict invalid cache entry");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(url, error = %e, "cache lookup failed, treating as miss");
            }
        }

        match self.fetcher.fetch(url, progress).await {
            Ok(data) => {
                // Populating the cache must not delay delivery.
                let cache = self.cache.clone();
                let store_url = url.to_string();
                let payload = data.clone();
                tokio::spawn(async move {
                    if let Err(e) = cache.store(&store_url, payload, options).await {
                        warn!(url = %store_url, error = %e, "failed to cache downloaded image");
                    }
                });
                Ok(data)
            }
            Err(err) => {
                if err.is_permanent() {
                    self.mark_failed(url);
                }
                Err(err)
            }
        }
    }

    /// Callback form of [`fetch`](Self::fetch): returns control to the
    /// caller immediately and invokes `completion` exactly once when the
    /// fetch settles.
    pub fn fetch_detached<F>(
        self: &Arc<Self>,
        url: &str,
        options: CacheOptions,
        progress: Option<ProgressCallback>,
        completion: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<Bytes, DownloadError>) + Send + 'static,
    {
        let coordinator = Arc::clone(self);
        let url = url.to_string();
        tokio::spawn(async move {
            let result = coordinator.fetch(&url, options, progress).await;
            completion(result);
        })
    }

    /// Whether the URL has been recorded as permanently unfetchable.
    pub fn is_failed(&self, url: &str) -> bool {
        self.failed_urls.read().contains(url)
    }

    fn mark_failed(&self, url: &str) {
        self.failed_urls.write().insert(url.to_string());
        debug!(url, "url added to negative cache");
    }
}
