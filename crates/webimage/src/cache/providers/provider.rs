//! # Cache Provider
//!
//! This module defines the cache provider trait that both storage tiers
//! implement.

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::types::{CacheKey, CacheLookup, CacheResult};

/// A single storage tier holding raw byte payloads keyed by [`CacheKey`].
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Check if the tier contains an entry for the given key.
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Get an entry from the tier.
    async fn get(&self, key: &CacheKey) -> CacheLookup;

    /// Insert or replace an entry. An update is a replacement, never an
    /// in-place mutation.
    async fn put(&self, key: CacheKey, data: Bytes) -> CacheResult<()>;

    /// Remove an entry. Removing an absent key is not an error.
    async fn remove(&self, key: &CacheKey) -> CacheResult<()>;

    /// Drop every entry in the tier.
    async fn clear(&self) -> CacheResult<()>;
}
