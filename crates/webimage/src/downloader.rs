//! # Image Downloader
//!
//! One network fetch per invocation: validate, precheck connectivity,
//! stream the body while reporting throttled progress, then probe the
//! payload for validity. Exactly one terminal outcome per call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use humansize::{BINARY, format_size};
use reqwest::Client;
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::WebImageConfig;
use crate::error::DownloadError;
use crate::probe::{AlwaysOnline, ConnectivityProbe, DecodedImageValidator, ImageValidator};

/// Advisory download-progress callback; receives a monotonically
/// non-decreasing fraction in `[0, 1]`, `1.0` exactly once on success.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &WebImageConfig) -> Result<Client, DownloadError> {
    // Create the crypto provider
    let provider = Arc::new(ring::default_provider());

    // Build platform default TLS configuration
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to configure default TLS protocol versions")
        .with_platform_verifier()
        .unwrap()
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5) // Allow multiple connections to same host
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder
        .build()
        .map_err(|e| DownloadError::Unknown(e.to_string()))
}

/// Performs one fetch per call. The seam the coordinator depends on, so
/// tests can observe or script download attempts.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Bytes, DownloadError>;
}

/// HTTP image downloader backed by a pooled reqwest client.
pub struct ImageDownloader {
    client: Client,
    connectivity: Arc<dyn ConnectivityProbe>,
    validator: Arc<dyn ImageValidator>,
}

impl ImageDownloader {
    /// Create a downloader with default probes: no reachability signal and
    /// decoded-image validation.
    pub fn new(config: &WebImageConfig) -> Result<Self, DownloadError> {
        Self::with_probes(
            config,
            Arc::new(AlwaysOnline),
            Arc::new(DecodedImageValidator),
        )
    }

    /// Create a downloader with host-supplied probes.
    pub fn with_probes(
        config: &WebImageConfig,
        connectivity: Arc<dyn ConnectivityProbe>,
        validator: Arc<dyn ImageValidator>,
    ) -> Result<Self, DownloadError> {
        Ok(Self {
            client: create_client(config)?,
            connectivity,
            validator,
        })
    }

    async fn fetch_bytes(
        &self,
        url: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Bytes, DownloadError> {
        // Structural validation happens before any network access.
        if !is_url_candidate(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }

        if !self.connectivity.is_reachable() {
            return Err(DownloadError::NoConnectivity);
        }

        let parsed = url
            .parse::<Url>()
            .map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;

        info!(url, "starting image download");
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::from_transport(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::from_status(status, url));
        }

        let total = response.content_length();
        if let Some(content_length) = total {
            info!(
                url,
                size = %format_size(content_length, BINARY),
                "download size information available"
            );
        } else {
            debug!(url, "content length not available");
        }

        let mut buf: Vec<u8> = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut received: u64 = 0;
        let mut meter = ProgressMeter::new(progress);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::from_transport(e, url))?;
            received += chunk.len() as u64;
            buf.extend_from_slice(&chunk);
            meter.update(received, total);
        }

        let data = Bytes::from(buf);
        if !self.validator.is_valid_image(&data) {
            warn!(url, size = data.len(), "downloaded payload failed image validation");
            return Err(DownloadError::DecodeFailure);
        }

        meter.finish();
        Ok(data)
    }
}

#[async_trait]
impl ImageFetcher for ImageDownloader {
    async fn fetch(
        &self,
        url: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Bytes, DownloadError> {
        self.fetch_bytes(url, progress).await
    }
}

/// A fetchable URL is non-empty and carries an http(s) scheme prefix.
fn is_url_candidate(url: &str) -> bool {
    !url.is_empty() && url.starts_with("http")
}

/// Emits progress fractions at a bounded cadence. Fractions are strictly
/// increasing below `1.0`; the terminal `1.0` is emitted once by
/// [`finish`](ProgressMeter::finish) after the payload is accepted.
struct ProgressMeter {
    callback: Option<ProgressCallback>,
    last_fraction: f32,
    last_emit: Option<Instant>,
}

impl ProgressMeter {
    const CADENCE: Duration = Duration::from_millis(100);

    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last_fraction: 0.0,
            last_emit: None,
        }
    }

    fn update(&mut self, received: u64, total: Option<u64>) {
        let Some(callback) = &self.callback else {
            return;
        };
        // Without a content length there is no meaningful fraction.
        let Some(total) = total else {
            return;
        };
        if total == 0 {
            return;
        }

        let fraction = ((received as f64) / (total as f64)).min(1.0) as f32;
        if fraction <= self.last_fraction || fraction >= 1.0 {
            return;
        }
        if let Some(last) = self.last_emit {
            if last.elapsed() < Self::CADENCE {
                return;
            }
        }

        self.last_fraction = fraction;
        self.last_emit = Some(Instant::now());
        callback(fraction);
    }

    fn finish(&mut self) {
        if let Some(callback) = &self.callback {
            self.last_fraction = 1.0;
            callback(1.0);
        }
    }
}
