//! # Disk Cache Provider
//!
//! Persistent tier: one flat directory of `{32-hex-digest}{ext}` files.
//! File modification/access times double as the recency signal consumed by
//! the eviction sweep; there is no metadata sidecar.
//!
//! All operations touching one derived path are serialized through a
//! per-filename async mutex, so a store racing an eviction delete for the
//! same key cannot interleave. Different keys proceed independently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::cache::types::{CacheKey, CacheLookup, CacheResult};

use super::CacheProvider;

/// Table of per-filename async locks.
#[derive(Default)]
pub(crate) struct KeyLocks {
    locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn for_filename(&self, filename: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[derive(Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
    initialized: Arc<AtomicBool>,
    locks: Arc<KeyLocks>,
}

impl DiskCache {
    /// Create a new disk cache rooted at the given directory. The directory
    /// is created lazily on first use.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            initialized: Arc::new(AtomicBool::new(false)),
            locks: Arc::new(KeyLocks::default()),
        }
    }

    /// Directory holding the cached files.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Create the cache directory once, no matter how many tasks race here.
    pub(crate) async fn ensure_initialized(&self) -> io::Result<()> {
        // Fast path - already initialized
        if self.initialized.load(Ordering::Relaxed) {
            return Ok(());
        }

        if self
            .initialized
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            // We won the race, do initialization
            fs::create_dir_all(&self.cache_dir).await?;
            self.initialized.store(true, Ordering::Release);
        } else {
            // Another task is initializing, wait for it to complete
            while !self.initialized.load(Ordering::Acquire) {
                tokio::task::yield_now().await;
            }
        }

        Ok(())
    }

    /// Path of the file backing a cached resource.
    pub(crate) fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.filename())
    }

    /// Serialize an operation against one derived filename.
    pub(crate) fn lock_for(&self, filename: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.for_filename(filename)
    }
}

#[async_trait::async_trait]
impl CacheProvider for DiskCache {
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        self.ensure_initialized().await?;
        fs::try_exists(&self.path_for(key)).await
    }

    async fn get(&self, key: &CacheKey) -> CacheLookup {
        self.ensure_initialized().await?;

        let path = self.path_for(key);
        let lock = self.lock_for(&key.filename());
        let _guard = lock.lock().await;

        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = ?path, error = %e, "failed to read cache file");
                Err(e)
            }
        }
    }

    async fn put(&self, key: CacheKey, data: Bytes) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let path = self.path_for(&key);
        let lock = self.lock_for(&key.filename());
        let _guard = lock.lock().await;

        // Write to a temporary file then rename, so a reader never sees a
        // partially written payload.
        let temp_path = path.with_extension("tmp");
        if let Err(e) = fs::write(&temp_path, &data).await {
            warn!(path = ?temp_path, error = %e, "failed to write cache file");
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(from = ?temp_path, to = ?path, error = %e, "failed to rename cache file");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(key = %key, size = data.len(), "cached entry to disk");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let path = self.path_for(key);
        let lock = self.lock_for(&key.filename());
        let _guard = lock.lock().await;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = ?path, error = %e, "failed to remove cache file");
                Err(e)
            }
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let mut entries = fs::read_dir(&self.cache_dir).await?;
        let mut removed = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = ?path, error = %e, "failed to remove cache file");
            } else {
                removed += 1;
            }
        }

        debug!(count = removed, "disk cache cleared");
        Ok(())
    }
}
