//! In-memory cache using moka + dashmap
//!
//! moka holds serialized entries with per-entry TTLs; dashmap holds the
//! fixed-window counters used by the rate limiter.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;

use crate::core::config::CacheConfig;

#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    ttl: Option<Duration>,
}

/// Per-entry expiry for variable TTLs
struct VariableTtlExpiry;

impl Expiry<String, CacheEntry> for VariableTtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

struct CounterEntry {
    count: AtomicI64,
    expires_at: Instant,
}

pub struct InMemoryCache {
    cache: Cache<String, CacheEntry>,
    counters: DashMap<String, CounterEntry>,
    /// Incremented on every `incr`; drives periodic counter cleanup
    cleanup_ops: AtomicU64,
}

impl InMemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .initial_capacity((config.max_entries as usize / 4).min(10_000))
            .expire_after(VariableTtlExpiry)
            .build();

        Self {
            cache,
            counters: DashMap::new(),
            cleanup_ops: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key).await.map(|entry| entry.data)
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let entry = CacheEntry { data: value, ttl };
        self.cache.insert(key.to_string(), entry).await;
    }

    /// Returns whether the key was present
    pub async fn delete(&self, key: &str) -> bool {
        let existed = self.cache.contains_key(key);
        self.cache.invalidate(key).await;
        existed
    }

    /// Delete every entry whose key starts with the pattern's prefix (`prefix*`)
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let prefix = pattern.trim_end_matches('*');

        // moka iter yields Arc<String> keys
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| (*k).clone())
            .collect();

        let mut count = 0u64;
        for key in keys {
            self.cache.invalidate(&key).await;
            count += 1;
        }
        count
    }

    /// Atomic fixed-window increment; an expired window restarts at 1
    pub fn incr(&self, key: &str, ttl: Duration) -> i64 {
        use dashmap::mapref::entry::Entry;

        let now = Instant::now();
        let expires_at = now + ttl;

        let count = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                if now >= counter.expires_at {
                    counter.count.store(1, Ordering::SeqCst);
                    counter.expires_at = expires_at;
                    1
                } else {
                    counter.count.fetch_add(1, Ordering::SeqCst) + 1
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CounterEntry {
                    count: AtomicI64::new(1),
                    expires_at,
                });
                1
            }
        };

        let ops = self.cleanup_ops.fetch_add(1, Ordering::Relaxed);
        if ops.is_multiple_of(256) {
            let now = Instant::now();
            self.counters.retain(|_, entry| now < entry.expires_at);
        }

        count
    }

    /// Time left in a counter's window
    pub fn counter_ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.counters.get(key)?;
        let remaining = entry.expires_at.saturating_duration_since(Instant::now());
        (remaining > Duration::ZERO).then_some(remaining)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
