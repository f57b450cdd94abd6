//! In-process TTL cache backing the time-based page caches on the catalog
//! read views. Entries are evicted lazily on read; writes never invalidate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() > expires_at)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        {
            let store = self.store.read().expect("cache lock poisoned");
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired entry: drop it so the map does not grow unbounded.
        let mut store = self.store.write().expect("cache lock poisoned");
        store.remove(key);
        None
    }

    pub fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let mut store = self.store.write().expect("cache lock poisoned");
        store.insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    pub fn clear(&self) {
        let mut store = self.store.write().expect("cache lock poisoned");
        store.clear();
    }
}
