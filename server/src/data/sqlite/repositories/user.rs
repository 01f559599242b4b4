//! User repository for SQLite operations
//!
//! Emails are stored lowercased; lookups lowercase their input.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::core::constants::CACHE_TTL_USER;
use crate::data::cache::{CacheKey, CacheService};
use crate::data::sqlite::SqliteError;
use crate::data::types::{UserCredentials, UserRow};

type UserTuple = (String, String, String, i64, i64);

fn to_user((id, email, name, created_at, updated_at): UserTuple) -> UserRow {
    UserRow {
        id,
        email,
        name,
        created_at,
        updated_at,
    }
}

/// Create a new user. Duplicate emails map to `SqliteError::Conflict`.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<UserRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();
    let email = email.trim().to_lowercase();

    sqlx::query(
        "INSERT INTO users (id, email, name, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&email)
    .bind(name)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| SqliteError::unique_or(e, "Email is already registered"))?;

    Ok(UserRow {
        id,
        email,
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    })
}

/// Get a user by ID (with optional caching)
pub async fn get_user(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    id: &str,
) -> Result<Option<UserRow>, SqliteError> {
    let Some(cache) = cache else {
        return get_user_from_db(pool, id).await;
    };
    let key = CacheKey::user(id);

    match cache.get::<UserRow>(&key).await {
        Ok(Some(user)) => {
            tracing::trace!(%id, "User cache hit");
            return Ok(Some(user));
        }
        Err(e) => tracing::warn!(%id, error = %e, "Cache get error"),
        Ok(None) => {}
    }

    let result = get_user_from_db(pool, id).await?;

    if let Some(ref user) = result
        && let Err(e) = cache
            .set(&key, user, Some(Duration::from_secs(CACHE_TTL_USER)))
            .await
    {
        tracing::warn!(%id, error = %e, "Cache set error");
    }

    Ok(result)
}

async fn get_user_from_db(pool: &SqlitePool, id: &str) -> Result<Option<UserRow>, SqliteError> {
    let row = sqlx::query_as::<_, UserTuple>(
        "SELECT id, email, name, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(to_user))
}

pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRow>, SqliteError> {
    let row = sqlx::query_as::<_, UserTuple>(
        "SELECT id, email, name, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(to_user))
}

/// Load the stored password hash alongside the user (login only)
pub async fn get_credentials(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserCredentials>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, String, i64, i64, String)>(
        "SELECT id, email, name, created_at, updated_at, password_hash FROM users WHERE email = ?",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(id, email, name, created_at, updated_at, password_hash)| UserCredentials {
            user: to_user((id, email, name, created_at, updated_at)),
            password_hash,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::sqlite::repositories::test_support::setup_test_pool;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let pool = setup_test_pool().await;
        let user = create_user(&pool, "Alice@Example.com", "Alice", "hash")
            .await
            .unwrap();

        assert!(!user.id.is_empty());
        assert_eq!(user.email, "alice@example.com");

        let fetched = get_user(&pool, None, &user.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Alice");

        let by_email = get_by_email(&pool, "ALICE@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let pool = setup_test_pool().await;
        create_user(&pool, "bob@example.com", "Bob", "hash")
            .await
            .unwrap();

        let err = create_user(&pool, "BOB@example.com", "Bob 2", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, SqliteError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_credentials_include_hash() {
        let pool = setup_test_pool().await;
        create_user(&pool, "carol@example.com", "Carol", "$argon2id$stub")
            .await
            .unwrap();

        let creds = get_credentials(&pool, "carol@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.password_hash, "$argon2id$stub");
        assert!(get_credentials(&pool, "nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_user_populates_cache() {
        let pool = setup_test_pool().await;
        let cache = CacheService::new(&CacheConfig { max_entries: 100 });
        let user = create_user(&pool, "dave@example.com", "Dave", "hash")
            .await
            .unwrap();

        get_user(&pool, Some(&cache), &user.id).await.unwrap();
        let cached: Option<UserRow> = cache.get(&CacheKey::user(&user.id)).await.unwrap();
        assert_eq!(cached.map(|u| u.email), Some("dave@example.com".to_string()));
    }
}
