//! Type-safe cache key builder with versioning

use crate::core::constants::CACHE_KEY_VERSION;

/// Type-safe cache key builder
///
/// All keys are prefixed with a version (e.g., "v1:") so a schema change can
/// orphan every cached entry at once.
pub struct CacheKey;

impl CacheKey {
    /// Cache key for user by ID
    pub fn user(id: &str) -> String {
        format!("{}:user:{}", CACHE_KEY_VERSION, id)
    }

    /// Cache key for project by ID
    pub fn project(id: &str) -> String {
        format!("{}:project:{}", CACHE_KEY_VERSION, id)
    }

    /// Cache key for a user's membership in a project
    pub fn member(project_id: &str, user_id: &str) -> String {
        format!("{}:member:{}:{}", CACHE_KEY_VERSION, project_id, user_id)
    }

    /// Prefix pattern matching every membership key of a project
    pub fn members_of(project_id: &str) -> String {
        format!("{}:member:{}:*", CACHE_KEY_VERSION, project_id)
    }

    /// Cache key for rate limit counter
    ///
    /// Rate limit keys are not versioned; counter semantics never change.
    pub fn rate_limit(bucket: &str, identifier: &str) -> String {
        format!("rl:{}:{}", bucket, identifier)
    }
}
