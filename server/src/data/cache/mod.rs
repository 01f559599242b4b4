//! In-memory cache and rate limiting
//!
//! Repositories consult the cache on hot reads (users, projects, memberships)
//! and invalidate on writes. Cache failures are logged and never fail a request.

mod error;
mod key;
mod memory;
pub mod rate_limiter;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use error::CacheError;
pub use key::CacheKey;
pub use rate_limiter::{RateLimitBucket, RateLimitResult, RateLimiter};

use memory::InMemoryCache;

use crate::core::config::CacheConfig;

/// Typed cache over the in-memory backend (MessagePack values)
pub struct CacheService {
    backend: InMemoryCache,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("entries", &self.backend.entry_count())
            .finish()
    }
}

impl CacheService {
    pub fn new(config: &CacheConfig) -> Self {
        tracing::debug!(max_entries = config.max_entries, "Initializing in-memory cache");
        Self {
            backend: InMemoryCache::new(config),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(bytes) = self.backend.get(key).await else {
            return Ok(None);
        };
        Ok(Some(rmp_serde::from_slice(&bytes)?))
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes = rmp_serde::to_vec(value)?;
        self.backend.set(key, bytes, ttl).await;
        Ok(())
    }

    /// Drop a single key
    pub async fn invalidate_key(&self, key: &str) {
        if self.backend.delete(key).await {
            tracing::trace!(%key, "Cache key invalidated");
        }
    }

    /// Drop every key matching a `prefix*` pattern
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let count = self.backend.delete_pattern(pattern).await;
        tracing::trace!(%pattern, count, "Cache pattern invalidated");
        count
    }

    pub(crate) fn incr(&self, key: &str, ttl: Duration) -> i64 {
        self.backend.incr(key, ttl)
    }

    pub(crate) fn counter_ttl(&self, key: &str) -> Option<Duration> {
        self.backend.counter_ttl(key)
    }

    pub fn entry_count(&self) -> u64 {
        self.backend.entry_count()
    }
}

/// Invalidate cached state tied to one project membership
pub async fn invalidate_membership(cache: &CacheService, project_id: &str, user_id: &str) {
    cache
        .invalidate_key(&CacheKey::member(project_id, user_id))
        .await;
}
