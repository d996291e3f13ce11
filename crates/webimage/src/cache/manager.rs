//! # Image Cache
//!
//! Two-tier cache coordinating the memory and disk providers. Which tiers
//! take part in a call is decided per call by [`CacheOptions`]; memory is
//! always consulted before disk, and a disk hit is not promoted into
//! memory. A one-shot eviction sweep over the disk directory is spawned
//! when the cache is constructed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::io;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::eviction::{FileRecord, plan_sweep};
use crate::cache::providers::{CacheProvider, DiskCache, MemoryCache};
use crate::cache::types::{CacheConfig, CacheKey, CacheLookup, CacheOptions, CacheResult};

/// Subdirectory of the storage root holding the cached files.
const CACHE_DIR_NAME: &str = "webimages";

/// Two-tier image cache.
#[derive(Clone)]
pub struct ImageCache {
    memory: Arc<MemoryCache>,
    disk: Arc<DiskCache>,
    config: Arc<CacheConfig>,
}

impl ImageCache {
    /// Create the cache, prepare its disk directory, and kick off the
    /// background eviction sweep.
    pub async fn new(config: CacheConfig) -> io::Result<Self> {
        let root = config
            .storage_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let cache_dir = root.join(CACHE_DIR_NAME);

        let memory = Arc::new(MemoryCache::new(config.max_memory_bytes));
        let disk = Arc::new(DiskCache::new(cache_dir));
        disk.ensure_initialized().await?;

        let cache = Self {
            memory,
            disk,
            config: Arc::new(config),
        };

        if !cache.config.eviction.is_disabled() {
            let sweeper = cache.clone();
            tokio::spawn(async move {
                sweeper.run_eviction_sweep().await;
            });
        }

        Ok(cache)
    }

    /// Directory holding the disk tier's files.
    pub fn disk_dir(&self) -> PathBuf {
        self.disk.cache_dir().to_path_buf()
    }

    /// Look a URL up in the selected tiers. Memory is checked before disk;
    /// no network I/O happens here.
    pub async fn lookup(&self, url: &str, options: CacheOptions) -> CacheLookup {
        let key = CacheKey::for_url(url);

        if options.contains(CacheOptions::MEMORY_CACHE) {
            if let Some(data) = self.memory.get(&key).await? {
                debug!(url, key = %key, "memory cache hit");
                return Ok(Some(data));
            }
        }

        if options.contains(CacheOptions::DISK_CACHE) {
            if let Some(data) = self.disk.get(&key).await? {
                debug!(url, key = %key, "disk cache hit");
                return Ok(Some(data));
            }
        }

        Ok(None)
    }

    /// Insert or replace the payload in the selected tiers. Callers on a
    /// latency-sensitive path spawn this rather than awaiting it inline.
    pub async fn store(&self, url: &str, data: Bytes, options: CacheOptions) -> CacheResult<()> {
        let key = CacheKey::for_url(url);

        if options.contains(CacheOptions::MEMORY_CACHE) {
            let _ = self.memory.put(key.clone(), data.clone()).await;
        }

        if options.contains(CacheOptions::DISK_CACHE) {
            self.disk.put(key, data).await?;
        }

        Ok(())
    }

    /// Delete the entry from the selected tiers. Used when a cached payload
    /// fails its validity probe so a corrupt entry is not served again.
    pub async fn remove(&self, url: &str, options: CacheOptions) -> CacheResult<()> {
        let key = CacheKey::for_url(url);

        let mem_result = if options.contains(CacheOptions::MEMORY_CACHE) {
            self.memory.remove(&key).await
        } else {
            Ok(())
        };

        let disk_result = if options.contains(CacheOptions::DISK_CACHE) {
            self.disk.remove(&key).await
        } else {
            Ok(())
        };

        disk_result.or(mem_result)
    }

    /// Drop everything from both tiers.
    pub async fn clear(&self) -> CacheResult<()> {
        let mem_result = self.memory.clear().await;
        let disk_result = self.disk.clear().await;
        disk_result.or(mem_result)
    }

    /// Drop the memory tier only; the disk tier is untouched. This is the
    /// response to the host's low-memory signal.
    pub async fn clear_memory(&self) {
        let _ = self.memory.clear().await;
        info!("memory tier cleared in response to memory pressure");
    }

    /// Listen for a host low-memory signal and clear the memory tier each
    /// time it fires. Returns the listener task's handle.
    pub fn spawn_low_memory_listener(
        &self,
        mut signal: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                match signal.recv().await {
                    Ok(()) => cache.clear_memory().await,
                    // Dropped notifications still mean pressure happened.
                    Err(broadcast::error::RecvError::Lagged(_)) => cache.clear_memory().await,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// One-shot disk reclamation pass. No-op when both policy dimensions
    /// are disabled. Per-file failures are logged and skipped; the sweep
    /// never fails startup.
    pub async fn run_eviction_sweep(&self) {
        let policy = self.config.eviction;
        if policy.is_disabled() {
            return;
        }

        let files = match self.list_disk_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = ?self.disk.cache_dir(), error = %e, "eviction sweep could not list cache directory");
                return;
            }
        };

        let doomed = plan_sweep(files, &policy, SystemTime::now());
        if doomed.is_empty() {
            debug!("eviction sweep found nothing to delete");
            return;
        }

        let mut deleted = 0usize;
        for path in &doomed {
            // Take the same per-key lock as store/remove so the sweep never
            // interleaves with a concurrent write to the same path.
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let lock = self.disk.lock_for(&filename);
            let _guard = lock.lock().await;

            match tokio::fs::remove_file(path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = ?path, error = %e, "eviction sweep failed to delete file"),
            }
        }

        info!(deleted, planned = doomed.len(), "eviction sweep finished");
    }

    async fn list_disk_files(&self) -> io::Result<Vec<FileRecord>> {
        let mut entries = tokio::fs::read_dir(self.disk.cache_dir()).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = ?entry.path(), error = %e, "skipping unreadable cache file");
                    continue;
                }
            };

            let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
            // Some filesystems do not track access times; the write time is
            // the closest recency signal then.
            let accessed = metadata.accessed().unwrap_or(modified);

            files.push(FileRecord {
                path: entry.path(),
                len: metadata.len(),
                accessed,
                modified,
            });
        }

        Ok(files)
    }
}
