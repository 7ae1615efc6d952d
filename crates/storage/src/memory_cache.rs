//! In-process LRU cache for rendered images.
//!
//! ## Memory-Based Eviction
//!
//! The cache is bounded by the total size of its entries, not their count.
//! When an insert would exceed the limit, batches of roughly 5% of the
//! capacity are freed, least recently used entries first, until the new
//! entry fits. An entry larger than the whole cache is not stored.
//!
//! ## Expiry
//!
//! TTLs are enforced on read. An expired entry is dropped the first time
//! it is looked up (or when eviction or a prefix delete reaches it); there
//! is no background sweep.

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use route_common::RouteResult;

use crate::cache::CacheStore;

/// Memory-bounded LRU cache with lazy TTL expiry.
#[derive(Clone)]
pub struct MemoryCache {
    cache: Arc<RwLock<LruCache<String, CachedEntry>>>,
    max_bytes: u64,
    stats: Arc<MemoryCacheStats>,
}

struct CachedEntry {
    data: Bytes,
    inserted_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

#[derive(Default)]
struct MemoryCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
    size_bytes: AtomicU64,
    entry_count: AtomicU64,
    eviction_runs: AtomicU64,
    oversized: AtomicU64,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCacheSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    pub size_bytes: u64,
    pub entry_count: u64,
    pub eviction_runs: u64,
    /// Inserts skipped because the entry alone exceeds the cache size
    pub oversized: u64,
}

impl MemoryCacheSnapshot {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl MemoryCache {
    /// Create a cache holding at most `max_size_mb` megabytes of entries.
    pub fn new(max_size_mb: usize) -> Self {
        Self::with_max_bytes((max_size_mb as u64) * 1024 * 1024)
    }

    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            // Entry count is unbounded; size is enforced by evict_batch_locked.
            cache: Arc::new(RwLock::new(LruCache::unbounded())),
            max_bytes,
            stats: Arc::new(MemoryCacheStats::default()),
        }
    }

    fn remove_accounted(&self, entry: &CachedEntry) {
        self.stats
            .size_bytes
            .fetch_sub(entry.data.len() as u64, Ordering::Relaxed);
        self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Free ~5% of capacity in LRU order. Caller holds the write lock.
    fn evict_batch_locked(&self, cache: &mut LruCache<String, CachedEntry>) -> (usize, u64) {
        let target_free = (self.max_bytes / 20).max(1);
        let mut bytes_freed = 0u64;
        let mut entries_evicted = 0usize;

        while bytes_freed < target_free {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    bytes_freed += evicted.data.len() as u64;
                    entries_evicted += 1;
                    self.remove_accounted(&evicted);
                }
                None => break,
            }
        }

        self.stats
            .evictions
            .fetch_add(entries_evicted as u64, Ordering::Relaxed);
        self.stats.eviction_runs.fetch_add(1, Ordering::Relaxed);

        info!(
            entries_evicted,
            bytes_freed,
            size_bytes = self.stats.size_bytes.load(Ordering::Relaxed),
            max_bytes = self.max_bytes,
            "Memory cache batch eviction completed"
        );

        (entries_evicted, bytes_freed)
    }

    pub fn snapshot(&self) -> MemoryCacheSnapshot {
        MemoryCacheSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expired: self.stats.expired.load(Ordering::Relaxed),
            size_bytes: self.stats.size_bytes.load(Ordering::Relaxed),
            entry_count: self.stats.entry_count.load(Ordering::Relaxed),
            eviction_runs: self.stats.eviction_runs.load(Ordering::Relaxed),
            oversized: self.stats.oversized.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.stats.entry_count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.stats.size_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> RouteResult<Option<Bytes>> {
        // LRU promotion mutates, so even reads take the write lock.
        let mut cache = self.cache.write().await;

        let expired = match cache.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(entry) = cache.pop(key) {
                self.remove_accounted(&entry);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, data: Bytes, ttl: Duration) -> RouteResult<()> {
        let size = data.len() as u64;
        let mut cache = self.cache.write().await;

        if let Some(existing) = cache.pop(key) {
            self.remove_accounted(&existing);
        }

        if size > self.max_bytes {
            self.stats.oversized.fetch_add(1, Ordering::Relaxed);
            warn!(key, size, max_bytes = self.max_bytes, "Entry exceeds memory cache size, not cached");
            return Ok(());
        }

        while self.size_bytes() + size > self.max_bytes {
            let (entries_evicted, _) = self.evict_batch_locked(&mut cache);
            if entries_evicted == 0 {
                break;
            }
        }

        cache.put(
            key.to_string(),
            CachedEntry {
                data,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        self.stats.size_bytes.fetch_add(size, Ordering::Relaxed);
        self.stats.entry_count.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    async fn delete(&self, key: &str) -> RouteResult<()> {
        let mut cache = self.cache.write().await;
        if let Some(entry) = cache.pop(key) {
            self.remove_accounted(&entry);
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> RouteResult<u64> {
        let mut cache = self.cache.write().await;

        let keys: Vec<String> = cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        let mut removed = 0u64;
        for key in keys {
            if let Some(entry) = cache.pop(&key) {
                self.remove_accounted(&entry);
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = MemoryCache::new(100);

        assert!(cache.is_empty());
        assert!(cache.get("k1").await.unwrap().is_none());

        let data = Bytes::from("test data");
        cache.set("k1", data.clone(), MINUTE).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k1").await.unwrap(), Some(data));

        let stats = cache.snapshot();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = MemoryCache::new(100);

        cache
            .set("k1", Bytes::from("test data"), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(cache.get("k1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get("k1").await.unwrap().is_none());
        let stats = cache.snapshot();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.size_bytes, 0);
    }

    #[tokio::test]
    async fn test_cache_memory_based_eviction() {
        let cache = MemoryCache::new(1);

        let entry = Bytes::from(vec![0u8; 100 * 1024]);
        for i in 0..15 {
            cache.set(&format!("k{}", i), entry.clone(), MINUTE).await.unwrap();
        }

        let stats = cache.snapshot();
        assert!(stats.evictions > 0);
        assert!(stats.eviction_runs > 0);
        assert!(stats.size_bytes <= 1024 * 1024);
        // most recent entry survives
        assert!(cache.get("k14").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_large_entry_evicts_until_it_fits() {
        let cache = MemoryCache::with_max_bytes(1000);

        for i in 0..10 {
            cache
                .set(&format!("k{}", i), Bytes::from(vec![1u8; 100]), MINUTE)
                .await
                .unwrap();
        }
        assert_eq!(cache.size_bytes(), 1000);

        cache.set("big", Bytes::from(vec![2u8; 500]), MINUTE).await.unwrap();

        let stats = cache.snapshot();
        assert_eq!(stats.size_bytes, 1000);
        assert_eq!(stats.entry_count, 6);
        assert_eq!(stats.evictions, 5);
        assert!(cache.get("big").await.unwrap().is_some());
        assert!(cache.get("k4").await.unwrap().is_none());
        assert!(cache.get("k5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_entry_larger_than_cache_is_not_stored() {
        let cache = MemoryCache::with_max_bytes(1000);
        cache.set("small", Bytes::from(vec![1u8; 100]), MINUTE).await.unwrap();
        cache.set("huge", Bytes::from(vec![1u8; 300]), MINUTE).await.unwrap();

        // Replacing with an oversized value drops the old one too.
        cache.set("huge", Bytes::from(vec![2u8; 1001]), MINUTE).await.unwrap();

        assert!(cache.get("huge").await.unwrap().is_none());
        assert!(cache.get("small").await.unwrap().is_some());
        let stats = cache.snapshot();
        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.size_bytes, 100);
        assert_eq!(stats.evictions, 0);
    }

    #[tokio::test]
    async fn test_replace_keeps_accounting() {
        let cache = MemoryCache::new(100);

        cache.set("k1", Bytes::from("hello"), MINUTE).await.unwrap();
        cache.set("k2", Bytes::from("world!"), MINUTE).await.unwrap();
        assert_eq!(cache.size_bytes(), 11);

        cache.set("k1", Bytes::from("hello world"), MINUTE).await.unwrap();
        assert_eq!(cache.size_bytes(), 17);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("k1").await.unwrap(), Some(Bytes::from("hello world")));
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = MemoryCache::new(100);

        cache.set("routemap:r1:route:a", Bytes::from("1"), MINUTE).await.unwrap();
        cache.set("routemap:r1:header:a", Bytes::from("2"), MINUTE).await.unwrap();
        cache.set("routemap:r10:route:a", Bytes::from("3"), MINUTE).await.unwrap();

        let removed = cache.delete_prefix("routemap:r1:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("routemap:r10:route:a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let cache = MemoryCache::new(1);
        cache.delete("nothing").await.unwrap();
        assert_eq!(cache.max_bytes(), 1024 * 1024);
    }
}
