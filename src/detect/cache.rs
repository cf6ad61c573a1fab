//! Scan result cache
//!
//! Caches per-pattern match ranges keyed by (pattern id, SHA-256 of the
//! text). Ranges are position data only, so identical repeated payloads
//! skip regex execution entirely while cached lookups stay byte-identical
//! to a fresh scan.

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type TextDigest = [u8; 32];
type CacheKey = (String, TextDigest);
type SpanList = Arc<Vec<(usize, usize)>>;

/// LRU cache of validated match ranges
pub struct ScanCache {
    inner: Option<Mutex<LruCache<CacheKey, SpanList>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScanCache {
    /// Create a cache with the given capacity. Zero disables caching
    /// and every lookup falls through to the scan closure.
    pub fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// SHA-256 digest of a payload, computed once per text and shared
    /// across all pattern lookups.
    pub fn digest(text: &str) -> TextDigest {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.finalize().into()
    }

    /// Return cached ranges for (pattern, digest), or run `scan` and
    /// cache its result.
    pub fn get_or_scan<F>(&self, pattern_id: &str, digest: &TextDigest, scan: F) -> SpanList
    where
        F: FnOnce() -> Vec<(usize, usize)>,
    {
        let Some(cache) = &self.inner else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Arc::new(scan());
        };

        let key = (pattern_id.to_string(), *digest);
        if let Some(spans) = cache.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(spans);
        }

        // Scan outside the lock; concurrent misses on the same key do
        // duplicate work but produce identical results.
        self.misses.fetch_add(1, Ordering::Relaxed);
        let spans = Arc::new(scan());
        cache.lock().put(key, Arc::clone(&spans));
        spans
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drop all cached entries. Counters are preserved.
    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.lock().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_returns_cached_spans() {
        let cache = ScanCache::new(8);
        let digest = ScanCache::digest("hello a@b.com");

        let first = cache.get_or_scan("email", &digest, || vec![(6, 13)]);
        let second = cache.get_or_scan("email", &digest, || panic!("must not rescan"));
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_distinct_patterns_do_not_collide() {
        let cache = ScanCache::new(8);
        let digest = ScanCache::digest("text");
        cache.get_or_scan("email", &digest, || vec![(0, 4)]);
        let other = cache.get_or_scan("phone_us", &digest, Vec::new);
        assert!(other.is_empty());
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_distinct_texts_do_not_collide() {
        let cache = ScanCache::new(8);
        let a = ScanCache::digest("alpha");
        let b = ScanCache::digest("beta");
        cache.get_or_scan("email", &a, || vec![(0, 5)]);
        let other = cache.get_or_scan("email", &b, Vec::new);
        assert!(other.is_empty());
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = ScanCache::new(0);
        let digest = ScanCache::digest("x");
        cache.get_or_scan("email", &digest, || vec![(0, 1)]);
        let again = cache.get_or_scan("email", &digest, Vec::new);
        assert!(again.is_empty());
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ScanCache::new(1);
        let a = ScanCache::digest("a");
        let b = ScanCache::digest("b");
        cache.get_or_scan("email", &a, || vec![(0, 1)]);
        cache.get_or_scan("email", &b, || vec![(0, 1)]);
        // "a" was evicted, so this is a miss again
        cache.get_or_scan("email", &a, || vec![(0, 1)]);
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 3);
    }
}
