use crate::client::ApiResponse;
use crate::query::CacheKey;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct CacheEntry {
    pub value: Arc<ApiResponse>,
    pub stored_at: Instant,
}

impl CacheEntry {
    pub fn new(value: Arc<ApiResponse>) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() > ttl
    }
}

pub enum CacheStatus {
    NotAvailable,
    Cached(Arc<ApiResponse>),
    Missed,
}

/// Successful responses keyed by [`CacheKey`], served until they outlive the TTL.
///
/// Expired entries are evicted lazily when read. A zero TTL turns the cache
/// into a passthrough.
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity,
        }
    }

    pub fn lookup(&self, key: &CacheKey, use_cache: bool) -> CacheStatus {
        if !use_cache || self.ttl.is_zero() {
            return CacheStatus::NotAvailable;
        }

        let entry = match self.entries.get(key) {
            Some(entry) => entry,
            None => return CacheStatus::Missed,
        };

        if entry.is_expired(self.ttl) {
            drop(entry);
            self.entries.remove(key);
            tracing::debug!("cache entry expired for key {}", key);
            return CacheStatus::Missed;
        }

        CacheStatus::Cached(entry.value.clone())
    }

    /// Store a response, replacing any previous entry. Failed responses are rejected.
    pub fn store(&self, key: CacheKey, value: Arc<ApiResponse>) -> bool {
        if !value.success || self.ttl.is_zero() {
            return false;
        }

        if self.capacity > 0
            && self.entries.len() >= self.capacity
            && !self.entries.contains_key(&key)
        {
            self.evict_oldest();
        }

        tracing::debug!("cached response for key {}", key);
        self.entries.insert(key, CacheEntry::new(value));
        true
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.stored_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
