//! # WebImage Engine
//!
//! A library for fetching web images through a two-tier cache with
//! negative-result memoization.
//!
//! ## Features
//!
//! - Memory and disk cache tiers, selected per call by an open flag set
//! - Content-derived cache keys stable across process restarts
//! - Background disk eviction by age and aggregate size
//! - Process-lifetime negative cache of permanently failed URLs
//! - Throttled download-progress reporting
//! - Pluggable connectivity and payload-validity probes
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webimage_engine::{
//!     CacheConfig, CacheOptions, DecodedImageValidator, FetchCoordinator, ImageCache,
//!     ImageDownloader, ImageRequest, WebImageConfig,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ImageCache::new(CacheConfig::default()).await?;
//! let downloader = Arc::new(ImageDownloader::new(&WebImageConfig::default())?);
//! let coordinator = Arc::new(FetchCoordinator::new(
//!     cache,
//!     downloader,
//!     Arc::new(DecodedImageValidator),
//! ));
//!
//! ImageRequest::new("https://example.com/logo.png")
//!     .options(CacheOptions::MEMORY_CACHE | CacheOptions::DISK_CACHE)
//!     .on_progress(|fraction| println!("{:.0}%", fraction * 100.0))
//!     .dispatch(&coordinator, |result| match result {
//!         Ok(bytes) => println!("got {} bytes", bytes.len()),
//!         Err(error) => eprintln!("failed: {error}"),
//!     });
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod downloader;
pub mod error;
pub mod probe;
pub mod request;

pub use builder::WebImageConfigBuilder;
pub use cache::{
    CacheConfig, CacheKey, CacheLookup, CacheOptions, CacheProvider, CacheResult, EvictionPolicy,
    ImageCache,
};
pub use config::WebImageConfig;
pub use coordinator::FetchCoordinator;
pub use downloader::{ImageDownloader, ImageFetcher, ProgressCallback, create_client};
pub use error::{DownloadError, ErrorKind};
pub use probe::{AlwaysOnline, ConnectivityProbe, DecodedImageValidator, ImageValidator};
pub use request::{ImageRequest, LoadingCallback};
