//! # Cache Types
//!
//! This module defines common types used across the caching system.

use bitflags::bitflags;
use bytes::Bytes;
use md5::{Digest, Md5};
use std::path::PathBuf;

/// Extension used when the URL path carries none.
pub const DEFAULT_EXTENSION: &str = ".img";

bitflags! {
    /// Per-call cache behavior flags.
    ///
    /// Any subset is valid; an empty set means "no caching, network only".
    /// Unrecognized bits are tolerated so callers built against a newer
    /// flag set keep working.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CacheOptions: u32 {
        /// Keep the payload in the in-memory tier.
        const MEMORY_CACHE = 1;
        /// Keep the payload in the on-disk tier.
        const DISK_CACHE = 1 << 1;
        /// Hint for the request facade to toggle a loading signal.
        /// The cache itself ignores this bit.
        const SHOW_LOADING_INDICATOR = 1 << 2;
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions::DISK_CACHE | CacheOptions::SHOW_LOADING_INDICATOR
    }
}

/// Storage identifier derived from a URL.
///
/// The digest is the MD5 of the full URL string, rendered as 32 lowercase
/// hex characters; the same URL always derives the same key, across calls
/// and across process restarts. Distinct URLs may collide, but a 128-bit
/// digest makes that negligible and collisions are not specially handled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    extension: String,
}

impl CacheKey {
    /// Derive the cache key for a URL.
    pub fn for_url(url: &str) -> Self {
        let digest = hex::encode(Md5::digest(url.as_bytes()));
        Self {
            digest,
            extension: path_extension(url),
        }
    }

    /// Hex-encoded digest without the extension.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Filename stem + extension used on the disk tier.
    pub fn filename(&self) -> String {
        format!("{}{}", self.digest, self.extension)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.digest, self.extension)
    }
}

/// Extension of the URL's path (leading dot, word characters only), or the
/// default placeholder when the path has none.
fn path_extension(url: &str) -> String {
    // Query and fragment are not part of the path extension.
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);

    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => {
            let word: String = ext
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if word.is_empty() {
                DEFAULT_EXTENSION.to_string()
            } else {
                format!(".{word}")
            }
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Disk reclamation budget for the eviction sweep.
///
/// `0` disables that dimension. The default keeps the age limit on and the
/// size limit off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Files whose last access is older than this many days are deleted.
    pub max_age_days: u32,
    /// Aggregate size budget for the disk tier, in bytes.
    pub max_total_bytes: u64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 7,
            max_total_bytes: 0,
        }
    }
}

impl EvictionPolicy {
    /// Both dimensions disabled means the sweep has nothing to do.
    pub fn is_disabled(&self) -> bool {
        self.max_age_days == 0 && self.max_total_bytes == 0
    }
}

/// Configuration for the two-tier image cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Host-provided persistent-storage root. The cache directory lives in
    /// a `webimages` subdirectory. Falls back to the system temp dir.
    pub storage_root: Option<PathBuf>,
    /// Disk reclamation budget applied by the startup sweep.
    pub eviction: EvictionPolicy,
    /// Byte-weighted capacity for the memory tier; `0` means unbounded.
    pub max_memory_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            eviction: EvictionPolicy::default(),
            max_memory_bytes: 0,
        }
    }
}

/// Result of a cache operation.
pub type CacheResult<T> = std::result::Result<T, std::io::Error>;

/// Result of a cache lookup: the payload, or absent.
pub type CacheLookup = CacheResult<Option<Bytes>>;
