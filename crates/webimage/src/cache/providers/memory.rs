//! # Memory Cache Provider
//!
//! In-memory tier backed by a Moka cache. Entries survive until they are
//! replaced, removed, or the whole tier is cleared in response to memory
//! pressure; with a non-zero capacity Moka additionally evicts by weight.

use bytes::Bytes;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::cache::providers::CacheProvider;
use crate::cache::types::{CacheKey, CacheLookup, CacheResult};

/// Memory cache provider implementation using Moka.
#[derive(Clone)]
pub struct MemoryCache {
    cache: MokaCache<CacheKey, Bytes>,
    /// Byte-weighted capacity; `0` means unbounded.
    max_bytes: u64,
}

impl MemoryCache {
    /// Create a new memory cache. `max_bytes == 0` leaves the tier
    /// unbounded; reclamation then happens only through [`clear`] (the
    /// low-memory response) and explicit removal.
    ///
    /// [`clear`]: CacheProvider::clear
    pub fn new(max_bytes: u64) -> Self {
        let mut builder = MokaCache::builder()
            .weigher(|_k, v: &Bytes| v.len().try_into().unwrap_or(u32::MAX));

        if max_bytes > 0 {
            builder = builder.max_capacity(max_bytes);
        }

        debug!(max_bytes, "memory cache created");

        Self {
            cache: builder.build(),
            max_bytes,
        }
    }

    /// Number of entries currently resident.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    #[cfg(test)]
    pub(crate) async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait::async_trait]
impl CacheProvider for MemoryCache {
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.cache.contains_key(key))
    }

    async fn get(&self, key: &CacheKey) -> CacheLookup {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: CacheKey, data: Bytes) -> CacheResult<()> {
        // A single entry larger than the whole tier would only thrash
        // Moka's admission policy; skip it.
        if self.max_bytes > 0 && data.len() as u64 > self.max_bytes {
            warn!(
                key = %key,
                size = data.len(),
                max_bytes = self.max_bytes,
                "entry too large for memory cache, skipping"
            );
            return Ok(());
        }

        self.cache.insert(key, data).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.cache.invalidate_all();
        debug!("memory cache cleared");
        Ok(())
    }
}
