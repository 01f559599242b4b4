//! Project team membership repository
//!
//! Membership reads support optional caching. The owner row is written once at
//! project creation and is immutable here.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::core::constants::CACHE_TTL_MEMBERSHIP;
use crate::data::cache::{CacheKey, CacheService, invalidate_membership};
use crate::data::sqlite::SqliteError;
use crate::data::types::{MemberRow, MemberWithUser, OwnerProtectedResult, TeamRole};

use super::parse_column;

/// Get a membership row (with optional caching)
pub async fn get_member(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    project_id: &str,
    user_id: &str,
) -> Result<Option<MemberRow>, SqliteError> {
    let Some(cache) = cache else {
        return get_member_from_db(pool, project_id, user_id).await;
    };
    let key = CacheKey::member(project_id, user_id);

    match cache.get::<MemberRow>(&key).await {
        Ok(Some(member)) => {
            tracing::trace!(%project_id, %user_id, "Membership cache hit");
            return Ok(Some(member));
        }
        Err(e) => tracing::warn!(%project_id, %user_id, error = %e, "Cache get error"),
        Ok(None) => {}
    }

    let result = get_member_from_db(pool, project_id, user_id).await?;

    if let Some(ref member) = result
        && let Err(e) = cache
            .set(&key, member, Some(Duration::from_secs(CACHE_TTL_MEMBERSHIP)))
            .await
    {
        tracing::warn!(%project_id, %user_id, error = %e, "Cache set error");
    }

    Ok(result)
}

async fn get_member_from_db(
    pool: &SqlitePool,
    project_id: &str,
    user_id: &str,
) -> Result<Option<MemberRow>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, String, i64)>(
        "SELECT project_id, user_id, role, joined_at FROM team_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(project_id, user_id, role, joined_at)| MemberRow {
        project_id,
        user_id,
        role: parse_column(&role, TeamRole::parse, TeamRole::Viewer, "role"),
        joined_at,
    }))
}

/// List the team of a project with user info, owner first
pub async fn list_members(
    pool: &SqlitePool,
    project_id: &str,
    page: u32,
    limit: u32,
) -> Result<(Vec<MemberWithUser>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;

    let rows = sqlx::query_as::<_, (String, String, String, String, i64)>(
        r#"
        SELECT u.id, u.email, u.name, tm.role, tm.joined_at
        FROM team_members tm
        JOIN users u ON tm.user_id = u.id
        WHERE tm.project_id = ?
        ORDER BY CASE tm.role WHEN 'owner' THEN 0 ELSE 1 END, tm.joined_at ASC, u.id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(project_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;

    let members = rows
        .into_iter()
        .map(|(user_id, email, name, role, joined_at)| MemberWithUser {
            user_id,
            email,
            name,
            role: parse_column(&role, TeamRole::parse, TeamRole::Viewer, "role"),
            joined_at,
        })
        .collect();

    Ok((members, total.0 as u64))
}

/// All member user ids of a project (notification fan-out)
pub async fn list_member_ids(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Vec<String>, SqliteError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT user_id FROM team_members WHERE project_id = ? ORDER BY joined_at",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
}

/// Change a member's role. The owner cannot be changed and nobody can be
/// promoted to owner.
pub async fn update_role(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    project_id: &str,
    user_id: &str,
    role: TeamRole,
) -> Result<OwnerProtectedResult<MemberRow>, SqliteError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, (String, i64)>(
        "SELECT role, joined_at FROM team_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((current_role, joined_at)) = current else {
        return Ok(OwnerProtectedResult::NotFound);
    };
    if current_role == TeamRole::Owner.as_str() || role == TeamRole::Owner {
        return Ok(OwnerProtectedResult::Owner);
    }

    sqlx::query("UPDATE team_members SET role = ? WHERE project_id = ? AND user_id = ?")
        .bind(role.as_str())
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if let Some(cache) = cache {
        invalidate_membership(cache, project_id, user_id).await;
    }

    Ok(OwnerProtectedResult::Success(MemberRow {
        project_id: project_id.to_string(),
        user_id: user_id.to_string(),
        role,
        joined_at,
    }))
}

/// Remove a member, their task assignments and risk ownerships in the project
pub async fn remove_member(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    project_id: &str,
    user_id: &str,
) -> Result<OwnerProtectedResult<()>, SqliteError> {
    let mut tx = pool.begin().await?;

    let membership = sqlx::query_as::<_, (String,)>(
        "SELECT role FROM team_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((role,)) = membership else {
        return Ok(OwnerProtectedResult::NotFound);
    };
    if role == TeamRole::Owner.as_str() {
        return Ok(OwnerProtectedResult::Owner);
    }

    sqlx::query(
        r#"
        DELETE FROM task_assignees
        WHERE user_id = ? AND task_id IN (SELECT id FROM tasks WHERE project_id = ?)
        "#,
    )
    .bind(user_id)
    .bind(project_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE risks SET owner_id = NULL WHERE project_id = ? AND owner_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM team_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if let Some(cache) = cache {
        invalidate_membership(cache, project_id, user_id).await;
    }

    Ok(OwnerProtectedResult::Success(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::sqlite::repositories::{risk, task};
    use crate::data::sqlite::repositories::test_support::{
        seed_project, seed_task, seed_user, setup_test_pool,
    };
    use crate::data::types::{NewRisk, RiskLevel, RiskStatus};

    async fn add_member(pool: &SqlitePool, project_id: &str, user_id: &str, role: TeamRole) {
        sqlx::query("INSERT INTO team_members (project_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
            .bind(project_id)
            .bind(user_id)
            .bind(role.as_str())
            .bind(chrono::Utc::now().timestamp())
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_owner_is_member_after_create() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;

        let member = get_member(&pool, None, &project.id, &owner.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.role, TeamRole::Owner);

        let (members, total) = list_members(&pool, &project.id, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(members[0].email, "owner@example.com");
    }

    #[tokio::test]
    async fn test_owner_is_immutable() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let other = seed_user(&pool, "other@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        add_member(&pool, &project.id, &other.id, TeamRole::Member).await;

        let demote = update_role(&pool, None, &project.id, &owner.id, TeamRole::Viewer)
            .await
            .unwrap();
        assert!(matches!(demote, OwnerProtectedResult::Owner));

        let promote = update_role(&pool, None, &project.id, &other.id, TeamRole::Owner)
            .await
            .unwrap();
        assert!(matches!(promote, OwnerProtectedResult::Owner));

        let remove = remove_member(&pool, None, &project.id, &owner.id)
            .await
            .unwrap();
        assert!(matches!(remove, OwnerProtectedResult::Owner));
    }

    #[tokio::test]
    async fn test_update_role_invalidates_cache() {
        let pool = setup_test_pool().await;
        let cache = CacheService::new(&CacheConfig { max_entries: 100 });
        let owner = seed_user(&pool, "owner@example.com").await;
        let other = seed_user(&pool, "other@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        add_member(&pool, &project.id, &other.id, TeamRole::Viewer).await;

        let before = get_member(&pool, Some(&cache), &project.id, &other.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.role, TeamRole::Viewer);

        let result = update_role(&pool, Some(&cache), &project.id, &other.id, TeamRole::Manager)
            .await
            .unwrap();
        assert!(matches!(result, OwnerProtectedResult::Success(_)));

        let after = get_member(&pool, Some(&cache), &project.id, &other.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.role, TeamRole::Manager);
    }

    #[tokio::test]
    async fn test_remove_member_drops_assignments() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let other = seed_user(&pool, "other@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        add_member(&pool, &project.id, &other.id, TeamRole::Member).await;
        let t = seed_task(&pool, &project.id, &owner.id).await;
        task::assign_user(&pool, &t.id, &other.id, &owner.id)
            .await
            .unwrap();

        let result = remove_member(&pool, None, &project.id, &other.id)
            .await
            .unwrap();
        assert!(matches!(result, OwnerProtectedResult::Success(())));
        assert!(task::list_assignee_ids(&pool, &t.id).await.unwrap().is_empty());
        assert!(
            get_member(&pool, None, &project.id, &other.id)
                .await
                .unwrap()
                .is_none()
        );

        let again = remove_member(&pool, None, &project.id, &other.id)
            .await
            .unwrap();
        assert!(matches!(again, OwnerProtectedResult::NotFound));
    }

    #[tokio::test]
    async fn test_remove_member_clears_risk_ownership() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let other = seed_user(&pool, "other@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        let elsewhere = seed_project(&pool, &owner.id, 0).await;
        add_member(&pool, &project.id, &other.id, TeamRole::Member).await;
        add_member(&pool, &elsewhere.id, &other.id, TeamRole::Member).await;

        let new = |owner_id: &str| NewRisk {
            title: "Vendor slip".to_string(),
            description: None,
            severity: RiskLevel::High,
            probability: RiskLevel::Medium,
            status: RiskStatus::Open,
            mitigation_plan: None,
            owner_id: Some(owner_id.to_string()),
        };
        let theirs = risk::create_risk(&pool, &project.id, &owner.id, &new(&other.id))
            .await
            .unwrap();
        let owners = risk::create_risk(&pool, &project.id, &owner.id, &new(&owner.id))
            .await
            .unwrap();
        let kept = risk::create_risk(&pool, &elsewhere.id, &owner.id, &new(&other.id))
            .await
            .unwrap();

        remove_member(&pool, None, &project.id, &other.id)
            .await
            .unwrap();

        let get = |project_id: String, id: String| {
            let pool = pool.clone();
            async move {
                risk::get_risk(&pool, &project_id, &id)
                    .await
                    .unwrap()
                    .unwrap()
            }
        };
        assert_eq!(get(project.id.clone(), theirs.id).await.owner_id, None);
        assert_eq!(get(project.id.clone(), owners.id).await.owner_id, Some(owner.id));
        assert_eq!(get(elsewhere.id.clone(), kept.id).await.owner_id, Some(other.id));
    }
}
