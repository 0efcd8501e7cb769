//! In-process LRU of decoded cache entries.
//!
//! Sits in front of the disk cache so repeated requests in one process skip
//! both the file read and the decode.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use regrid_common::CacheKey;

/// Bounded map from cache key to a shared decoded value.
///
/// A capacity of zero disables the cache.
pub struct MemoryCache<T> {
    entries: Option<Mutex<LruCache<CacheKey, Arc<T>>>>,
}

impl<T> MemoryCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c))),
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<CacheKey, Arc<T>>>> {
        // Recover from poisoning.
        self.entries
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.lock()?.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: Arc<T>) {
        if let Some(mut entries) = self.lock() {
            entries.put(key, value);
        }
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.lock()?.pop(key)
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().map_or(0, |e| e.cap().get())
    }

    pub fn clear(&self) {
        if let Some(mut entries) = self.lock() {
            entries.clear();
        }
    }
}
