//! Short-TTL cache of recently accepted content fingerprints.
//!
//! This cache is the single point that guarantees idempotence: enqueueing
//! logically identical content twice within the TTL window results in only
//! one queue entry and therefore only one network call.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

pub struct DedupCache {
    seen: DashMap<String, Instant>,
    ttl: Duration,
    last_sweep: Mutex<Instant>,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Whether this fingerprint was recorded within the TTL window.
    ///
    /// An expired entry is purged on the spot and does not count.
    pub fn is_duplicate(&self, hash: &str) -> bool {
        // The map guard must be released before the removal below
        let fresh = self.seen.get(hash).map(|entry| entry.elapsed() < self.ttl);
        match fresh {
            Some(true) => true,
            Some(false) => {
                self.seen.remove(hash);
                false
            }
            None => false,
        }
    }

    /// Mark a fingerprint as seen, refreshing its expiry.
    ///
    /// Piggybacks a full sweep at most once per TTL so entries for content
    /// that never repeats do not accumulate.
    pub fn record(&self, hash: &str) {
        self.seen.insert(hash.to_string(), Instant::now());
        self.sweep_if_due();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, inserted| inserted.elapsed() < self.ttl);
        before - self.seen.len()
    }

    fn sweep_if_due(&self) {
        let mut last = match self.last_sweep.try_lock() {
            Ok(guard) => guard,
            // Another caller is already sweeping
            Err(_) => return,
        };
        if last.elapsed() >= self.ttl {
            *last = Instant::now();
            let removed = self.purge_expired();
            if removed > 0 {
                tracing::debug!(removed = removed, remaining = self.seen.len(), "Purged expired dedup entries");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_then_duplicate() {
        let cache = DedupCache::new(Duration::from_secs(60));
        assert!(!cache.is_duplicate("abc"));

        cache.record("abc");
        assert!(cache.is_duplicate("abc"));
        assert!(!cache.is_duplicate("def"));
    }

    #[test]
    fn test_entry_expires() {
        let cache = DedupCache::new(Duration::from_millis(10));
        cache.record("abc");
        assert!(cache.is_duplicate("abc"));

        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.is_duplicate("abc"));
        // Lazy purge removed the stale entry
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = DedupCache::new(Duration::from_millis(10));
        cache.record("a");
        cache.record("b");
        cache.record("c");
        assert_eq!(cache.len(), 3);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.purge_expired(), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_record_refreshes_expiry() {
        let cache = DedupCache::new(Duration::from_millis(50));
        cache.record("abc");
        std::thread::sleep(Duration::from_millis(30));
        cache.record("abc");
        std::thread::sleep(Duration::from_millis(30));

        // Still within TTL of the refreshed entry
        assert!(cache.is_duplicate("abc"));
    }
}
