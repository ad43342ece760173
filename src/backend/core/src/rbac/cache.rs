//! Bounded, time-limited cache of module rows keyed by module key.
//!
//! Only positive lookups are cached: a key the directory does not know is
//! asked again next time. Activations and grants are never cached, so a
//! lifecycle change is visible to the very next decision.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

use super::models::{ModuleFilter, ModuleRecord};
use crate::config::CacheConfig;
use crate::directory::{Directory, DirectoryResult};
use crate::telemetry::CacheMetrics;

#[derive(Debug, Clone)]
struct CachedModule {
    record: ModuleRecord,
    inserted_at: Instant,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU + TTL cache of [`ModuleRecord`]s.
#[derive(Debug)]
pub struct ModuleCache {
    entries: DashMap<String, CachedModule>,
    /// Least recently used key at the front.
    lru_order: Mutex<VecDeque<String>>,
    config: CacheConfig,

    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ModuleCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            lru_order: Mutex::new(VecDeque::with_capacity(config.max_entries.min(1024))),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.max_entries > 0
    }

    /// A fresh cached row for `key`, counting the hit or miss.
    pub fn get(&self, key: &str) -> Option<ModuleRecord> {
        if !self.is_enabled() {
            return None;
        }

        let fresh = match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.config.ttl => {
                Some(entry.record.clone())
            }
            Some(_) => {
                trace!(module = key, "Cached module expired");
                None
            }
            None => None,
        };

        match fresh {
            Some(record) => {
                self.touch(key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                CacheMetrics::record_hit();
                Some(record)
            }
            None => {
                self.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheMetrics::record_miss();
                None
            }
        }
    }

    /// Store a row, evicting the least recently used entries when full.
    pub fn insert(&self, record: ModuleRecord) {
        if !self.is_enabled() {
            return;
        }

        let key = record.key.clone();
        let mut lru = self.lru_order.lock();
        lru.retain(|k| k != &key);
        while lru.len() >= self.config.max_entries {
            match lru.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    trace!(module = %oldest, "Evicted module from cache");
                }
                None => break,
            }
        }
        lru.push_back(key.clone());
        self.entries.insert(
            key,
            CachedModule {
                record,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop one key. Returns whether it was cached.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.remove(key);
        if removed {
            debug!(module = key, "Invalidated cached module");
        }
        removed
    }

    pub fn invalidate_all(&self) {
        let mut lru = self.lru_order.lock();
        lru.clear();
        self.entries.clear();
        debug!("Invalidated module cache");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Resolve one key, asking the directory on a miss.
    pub async fn get_or_fetch(
        &self,
        directory: &dyn Directory,
        key: &str,
    ) -> DirectoryResult<Option<ModuleRecord>> {
        if let Some(record) = self.get(key) {
            return Ok(Some(record));
        }

        let fetched = directory.get_module_by_key(key).await?;
        if let Some(record) = &fetched {
            self.insert(record.clone());
        }
        Ok(fetched)
    }

    /// Resolve many keys with at most one directory call for the misses.
    /// Keys the directory does not know are absent from the result.
    pub async fn get_many(
        &self,
        directory: &dyn Directory,
        keys: &[&str],
    ) -> DirectoryResult<HashMap<String, ModuleRecord>> {
        let mut found: HashMap<String, ModuleRecord> = HashMap::with_capacity(keys.len());
        let mut missing: Vec<&str> = Vec::new();
        for key in keys {
            if found.contains_key(*key) || missing.contains(key) {
                continue;
            }
            match self.get(key) {
                Some(record) => {
                    found.insert(record.key.clone(), record);
                }
                None => missing.push(*key),
            }
        }

        if !missing.is_empty() {
            let fetched = directory
                .list_modules(&ModuleFilter::keys(missing.iter().copied()))
                .await?;
            for record in fetched {
                self.insert(record.clone());
                found.insert(record.key.clone(), record);
            }
        }

        Ok(found)
    }

    fn touch(&self, key: &str) {
        let mut lru = self.lru_order.lock();
        if let Some(position) = lru.iter().position(|k| k == key) {
            if let Some(k) = lru.remove(position) {
                lru.push_back(k);
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        let mut lru = self.lru_order.lock();
        lru.retain(|k| k != key);
        self.entries.remove(key).is_some()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use std::time::Duration;

    fn module(key: &str) -> ModuleRecord {
        ModuleRecord::new(format!("module-{key}"), key, key)
    }

    fn cache(max_entries: usize, ttl: Duration) -> ModuleCache {
        ModuleCache::new(CacheConfig {
            enabled: true,
            max_entries,
            ttl,
        })
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let cache = cache(4, Duration::from_secs(60));
        assert!(cache.get("students").is_none());
        cache.insert(module("students"));
        assert_eq!(cache.get("students").unwrap().key, "students");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = cache(2, Duration::from_secs(60));
        cache.insert(module("a"));
        cache.insert(module("b"));
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.insert(module("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let cache = cache(2, Duration::from_secs(60));
        cache.insert(module("a"));
        cache.insert(module("b"));
        cache.insert(module("a"));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let cache = cache(4, Duration::ZERO);
        cache.insert(module("a"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_invalidate() {
        let cache = cache(4, Duration::from_secs(60));
        cache.insert(module("a"));
        cache.insert(module("b"));
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        cache.invalidate_all();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = ModuleCache::new(CacheConfig::disabled());
        cache.insert(module("a"));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_get_or_fetch_uses_directory_once() {
        let dir = InMemoryDirectory::with_standard_catalog();
        let cache = cache(16, Duration::from_secs(60));

        let first = cache.get_or_fetch(&dir, "paces").await.unwrap().unwrap();
        let calls = dir.calls();
        let second = cache.get_or_fetch(&dir, "paces").await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(dir.calls(), calls);

        assert!(cache.get_or_fetch(&dir, "unknown").await.unwrap().is_none());
        assert!(cache.get("unknown").is_none());
    }

    #[tokio::test]
    async fn test_get_many_batches_misses() {
        let dir = InMemoryDirectory::with_standard_catalog();
        let cache = cache(16, Duration::from_secs(60));
        cache.insert(dir.get_module_by_key("students").await.unwrap().unwrap());
        dir.reset_calls();

        let found = cache
            .get_many(&dir, &["students", "paces", "projections", "nope"])
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
        assert!(!found.contains_key("nope"));
        assert_eq!(dir.calls(), 1);
    }

    #[tokio::test]
    async fn test_directory_errors_propagate() {
        let dir = InMemoryDirectory::with_standard_catalog();
        dir.set_unavailable(true);
        let cache = cache(16, Duration::from_secs(60));
        assert!(cache.get_or_fetch(&dir, "paces").await.is_err());
        assert!(cache.get_many(&dir, &["paces"]).await.is_err());
    }
}
