//! # Image Request
//!
//! Thin per-call entry point. Translates a URL plus option flags into a
//! coordinator call and routes the outcome to a caller-supplied sink,
//! delivering an optional placeholder payload synchronously first and
//! toggling a loading signal around the asynchronous portion.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cache::CacheOptions;
use crate::coordinator::FetchCoordinator;
use crate::downloader::ProgressCallback;
use crate::error::DownloadError;

/// Signal toggled around the asynchronous fetch when
/// [`CacheOptions::SHOW_LOADING_INDICATOR`] is set.
pub type LoadingCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// One image request. Defaults match a typical view binding: disk caching
/// on, memory caching off, loading indicator shown.
pub struct ImageRequest {
    url: String,
    options: CacheOptions,
    placeholder: Option<Bytes>,
    progress: Option<ProgressCallback>,
    loading: Option<LoadingCallback>,
}

impl ImageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: CacheOptions::default(),
            placeholder: None,
            progress: None,
            loading: None,
        }
    }

    /// Replace the option flags for this request.
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Payload handed to the completion sink synchronously, before the
    /// fetch begins, so a caller can render something immediately.
    pub fn placeholder(mut self, placeholder: Bytes) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// Advisory download-progress callback.
    pub fn on_progress(mut self, callback: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Loading-signal callback; only invoked when the request carries
    /// [`CacheOptions::SHOW_LOADING_INDICATOR`].
    pub fn on_loading(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.loading = Some(Arc::new(callback));
        self
    }

    /// Dispatch the request. The placeholder (if any) reaches `completion`
    /// before this returns; the real outcome follows asynchronously,
    /// exactly once. An empty URL is logged and not fetched.
    pub fn dispatch<F>(
        self,
        coordinator: &Arc<FetchCoordinator>,
        completion: F,
    ) -> Option<JoinHandle<()>>
    where
        F: Fn(Result<Bytes, DownloadError>) + Send + Sync + 'static,
    {
        let completion: Arc<F> = Arc::new(completion);

        if let Some(placeholder) = &self.placeholder {
            completion(Ok(placeholder.clone()));
        }

        if self.url.is_empty() {
            warn!("image url is not set");
            return None;
        }

        let loading = self
            .options
            .contains(CacheOptions::SHOW_LOADING_INDICATOR)
            .then_some(self.loading)
            .flatten();

        if let Some(loading) = &loading {
            loading(true);
        }

        let sink = completion.clone();
        Some(coordinator.fetch_detached(
            &self.url,
            self.options,
            self.progress,
            move |result| {
                if let Some(loading) = &loading {
                    loading(false);
                }
                if let Err(error) = &result {
                    warn!(error = %error, "failed to load web image");
                }
                sink(result);
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, EvictionPolicy, ImageCache};
    use crate::downloader::ImageFetcher;
    use crate::probe::ImageValidator;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    struct FixedFetcher(Bytes);

    #[async_trait]
    impl ImageFetcher for FixedFetcher {
        async fn fetch(
            &self,
            _url: &str,
            _progress: Option<ProgressCallback>,
        ) -> Result<Bytes, DownloadError> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl ImageFetcher for FailingFetcher {
        async fn fetch(
            &self,
            _url: &str,
            _progress: Option<ProgressCallback>,
        ) -> Result<Bytes, DownloadError> {
            Err(DownloadError::NotFound("x".into()))
        }
    }

    struct AcceptAll;

    impl ImageValidator for AcceptAll {
        fn is_valid_image(&self, _data: &[u8]) -> bool {
            true
        }
    }

    async fn coordinator_with(
        fetcher: Arc<dyn ImageFetcher>,
    ) -> (Arc<FetchCoordinator>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let cache = ImageCache::new(CacheConfig {
            storage_root: Some(dir.path().to_path_buf()),
            eviction: EvictionPolicy {
                max_age_days: 0,
                max_total_bytes: 0,
            },
            max_memory_bytes: 0,
        })
        .await
        .unwrap();
        (
            Arc::new(FetchCoordinator::new(cache, fetcher, Arc::new(AcceptAll))),
            dir,
        )
    }

    #[tokio::test]
    async fn placeholder_arrives_before_the_real_payload() {
        let real = Bytes::from_static(b"real image");
        let (coordinator, _dir) = coordinator_with(Arc::new(FixedFetcher(real.clone()))).await;

        let deliveries: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = deliveries.clone();

        let handle = ImageRequest::new("https://example.com/a.png")
            .options(CacheOptions::empty())
            .placeholder(Bytes::from_static(b"placeholder"))
            .dispatch(&coordinator, move |result| {
                sink.lock().push(result.unwrap());
            })
            .unwrap();

        // The placeholder is delivered synchronously, before any await.
        assert_eq!(deliveries.lock().as_slice(), &[Bytes::from_static(b"placeholder")]);

        handle.await.unwrap();
        assert_eq!(
            deliveries.lock().as_slice(),
            &[Bytes::from_static(b"placeholder"), real]
        );
    }

    #[tokio::test]
    async fn loading_signal_toggles_around_the_fetch() {
        let (coordinator, _dir) = coordinator_with(Arc::new(FixedFetcher(Bytes::from_static(b"x")))).await;

        let toggles: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = toggles.clone();

        let handle = ImageRequest::new("https://example.com/a.png")
            .options(CacheOptions::SHOW_LOADING_INDICATOR)
            .on_loading(move |visible| sink.lock().push(visible))
            .dispatch(&coordinator, |_| {})
            .unwrap();
        handle.await.unwrap();

        assert_eq!(toggles.lock().as_slice(), &[true, false]);
    }

    #[tokio::test]
    async fn loading_signal_requires_the_option_flag() {
        let (coordinator, _dir) = coordinator_with(Arc::new(FixedFetcher(Bytes::from_static(b"x")))).await;

        let toggles: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = toggles.clone();

        let handle = ImageRequest::new("https://example.com/a.png")
            .options(CacheOptions::empty())
            .on_loading(move |visible| sink.lock().push(visible))
            .dispatch(&coordinator, |_| {})
            .unwrap();
        handle.await.unwrap();

        assert!(toggles.lock().is_empty());
    }

    #[tokio::test]
    async fn loading_signal_clears_on_error_too() {
        let (coordinator, _dir) = coordinator_with(Arc::new(FailingFetcher)).await;

        let toggles: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = toggles.clone();
        let errors: Arc<Mutex<Vec<DownloadError>>> = Arc::new(Mutex::new(Vec::new()));
        let error_sink = errors.clone();

        let handle = ImageRequest::new("https://example.com/a.png")
            .options(CacheOptions::SHOW_LOADING_INDICATOR)
            .on_loading(move |visible| sink.lock().push(visible))
            .dispatch(&coordinator, move |result| {
                error_sink.lock().push(result.unwrap_err());
            })
            .unwrap();
        handle.await.unwrap();

        assert_eq!(toggles.lock().as_slice(), &[true, false]);
        assert_eq!(errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn empty_url_is_not_dispatched() {
        let (coordinator, _dir) = coordinator_with(Arc::new(FixedFetcher(Bytes::from_static(b"x")))).await;

        let deliveries: Arc<Mutex<Vec<Result<Bytes, DownloadError>>>> =
            Arc::new(Mutex::new(Vec::new()));
        let sink = deliveries.clone();

        let handle = ImageRequest::new("")
            .placeholder(Bytes::from_static(b"placeholder"))
            .dispatch(&coordinator, move |result| sink.lock().push(result));

        assert!(handle.is_none());
        // The placeholder still went out; no fetch outcome follows.
        assert_eq!(deliveries.lock().len(), 1);
    }
}
