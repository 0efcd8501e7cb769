//! Cache statistics.
//!
//! All counters are atomic so the cache can be shared between threads and
//! read without locking.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct CacheStats {
    /// Entries found and validated
    pub hits: AtomicU64,
    /// Lookups that found nothing (or ran with the cache disabled)
    pub misses: AtomicU64,
    /// Entries that failed validation and were removed
    pub corrupt: AtomicU64,
    /// Framed bytes handed out by hits
    pub bytes_loaded: AtomicU64,
    /// Framed bytes committed by puts
    pub bytes_stored: AtomicU64,
    /// Puts discarded because another writer committed the key first
    pub lost_races: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self, bytes: usize) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.bytes_loaded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_corrupt(&self) {
        self.corrupt.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store(&self, bytes: usize) {
        self.bytes_stored.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_lost_race(&self) {
        self.lost_races.fetch_add(1, Ordering::Relaxed);
    }

    /// Calculate cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            corrupt: self.corrupt.load(Ordering::Relaxed),
            bytes_loaded: self.bytes_loaded.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            lost_races: self.lost_races.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Plain copy of [`CacheStats`], suitable for logging or serialising.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub corrupt: u64,
    pub bytes_loaded: u64,
    pub bytes_stored: u64,
    pub lost_races: u64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        stats.record_hit(10);
        stats.record_hit(10);
        stats.record_hit(10);
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 75.0);

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_loaded, 30);
        assert_eq!(snap.misses, 1);
    }
}
