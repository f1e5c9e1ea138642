use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

// Cache entry with timestamp
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub payload: V,
    pub fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Bounded TTL cache keyed by query parameters.
///
/// Expiry is lazy: an expired entry stays in the map (so it can still be used
/// as a degraded fallback through [`TtlCache::get_stale`]) but `get` treats it
/// as a miss. When the bound is exceeded the oldest *inserted* key is evicted;
/// overwriting an existing key keeps its original position.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    insertion_order: VecDeque<String>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    // fresh payload only, stale entries behave as a miss
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.payload.clone())
    }

    // any payload we still hold for the key, regardless of age
    pub fn get_stale(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    pub fn put(&mut self, key: impl Into<String>, payload: V) {
        let key = key.into();
        let entry = CacheEntry {
            payload,
            fetched_at: Instant::now(),
        };

        if self.entries.insert(key.clone(), entry).is_some() {
            return;
        }

        self.insertion_order.push_back(key);
        while self.insertion_order.len() > self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
                debug!(key = %oldest, "evicted oldest cache entry");
            }
        }
    }

    pub fn age(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).map(CacheEntry::age)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }
}
