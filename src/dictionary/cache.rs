//! LRU cache for expensive term scans.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::Mutex;

/// Caches the term lists produced by wildcard and prefix scans.
///
/// Entries are tagged with the dictionary generation they were computed
/// under; a lookup against a newer generation discards the entry. Eviction is
/// least-recently-used via a monotonic touch stamp.
#[derive(Debug)]
pub struct ScanCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug)]
struct CacheInner {
    entries: AHashMap<String, CachedScan>,
    stamp: u64,
}

#[derive(Debug)]
struct CachedScan {
    terms: Vec<String>,
    generation: u64,
    stamp: u64,
}

/// Cache performance counters.
#[derive(Debug, Clone, Copy)]
pub struct ScanCacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Current number of entries.
    pub size: usize,
    /// Maximum number of entries.
    pub capacity: usize,
}

impl ScanCacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl ScanCache {
    /// Create a cache holding at most `capacity` scan results.
    pub fn new(capacity: usize) -> Self {
        ScanCache {
            inner: Mutex::new(CacheInner {
                entries: AHashMap::new(),
                stamp: 0,
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Build the cache key for a scan of `pattern` over `field`.
    pub fn scan_key(field: &str, pattern: &str) -> String {
        format!("{field}\u{0}{pattern}")
    }

    /// Look up a cached scan, honoring the current dictionary generation.
    pub fn get(&self, key: &str, generation: u64) -> Option<Vec<String>> {
        let mut inner = self.inner.lock();
        inner.stamp += 1;
        let stamp = inner.stamp;

        if let Some(entry) = inner.entries.get_mut(key) {
            if entry.generation == generation {
                entry.stamp = stamp;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.terms.clone());
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // The entry was computed under an older dictionary state.
        inner.entries.remove(key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a scan result computed under `generation`.
    pub fn put(&self, key: String, terms: Vec<String>, generation: u64) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.lock();
        inner.stamp += 1;
        let stamp = inner.stamp;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stamp)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                inner.entries.remove(&victim);
            }
        }

        inner.entries.insert(
            key,
            CachedScan {
                terms,
                generation,
                stamp,
            },
        );
    }

    /// Drop every entry, returning how many were evicted.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let evicted = inner.entries.len();
        inner.entries.clear();
        evicted
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics.
    pub fn stats(&self) -> ScanCacheStats {
        ScanCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.capacity,
        }
    }
}
