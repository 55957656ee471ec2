use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::utils::time::Clock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// Time-boxed cache. Staleness is checked on read: an entry older than the TTL
/// is evicted by whichever caller first sees it, there is no background sweep.
#[derive(Clone)]
pub struct FreshnessCache<V> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> FreshnessCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    pub fn set(&self, key: &str, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(key.to_string(), entry);
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.entries.lock().expect("cache mutex poisoned");
        let fresh = match guard.get(key) {
            None => return None,
            // A clock that moved backwards yields a negative age, which counts as fresh.
            Some(entry) => now
                .signed_duration_since(entry.inserted_at)
                .to_std()
                .map(|age| age <= self.ttl)
                .unwrap_or(true),
        };
        if fresh {
            guard.get(key).map(|entry| entry.value.clone())
        } else {
            guard.remove(key);
            tracing::debug!(key, "Evicted stale cache entry");
            None
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes one entry, or every entry when `key` is `None`.
    pub fn clear(&self, key: Option<&str>) {
        let mut guard = self.entries.lock().expect("cache mutex poisoned");
        match key {
            Some(key) => {
                guard.remove(key);
            }
            None => guard.clear(),
        }
    }

    /// Entries currently held, including stale ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
