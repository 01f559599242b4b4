//! Project repository for SQLite operations
//!
//! Project reads support optional caching. Pass `Some(cache)` to enable caching,
//! or `None` to bypass cache. Mutations invalidate the project key and, on
//! delete, every cached membership of the project.

use std::time::Duration;

use sqlx::{SqliteConnection, SqlitePool};

use crate::core::constants::CACHE_TTL_PROJECT;
use crate::data::cache::{CacheKey, CacheService};
use crate::data::sqlite::SqliteError;
use crate::data::types::{
    BudgetEntryKind, NewProject, ProjectRow, ProjectStatus, ProjectUpdate, ProjectWithRole,
    TeamRole,
};

use super::budget::{HistoryEntry, insert_history};
use super::parse_column;

pub(super) const PROJECT_COLUMNS: &str = "p.id, p.owner_id, p.name, p.description, p.status, \
     p.start_date, p.end_date, p.total_budget_cents, p.actual_expenditure_cents, \
     p.created_at, p.updated_at";

pub(super) type ProjectTuple = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    i64,
    i64,
    i64,
    i64,
);

type ProjectRoleTuple = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    i64,
    i64,
    i64,
    i64,
    String,
);

pub(super) fn to_project(
    (
        id,
        owner_id,
        name,
        description,
        status,
        start_date,
        end_date,
        total_budget_cents,
        actual_expenditure_cents,
        created_at,
        updated_at,
    ): ProjectTuple,
) -> ProjectRow {
    ProjectRow {
        id,
        owner_id,
        name,
        description,
        status: parse_column(&status, ProjectStatus::parse, ProjectStatus::default(), "status"),
        start_date,
        end_date,
        total_budget_cents,
        actual_expenditure_cents,
        created_at,
        updated_at,
    }
}

/// Create a project, its owner membership and the opening budget entry atomically
pub async fn create_project(
    pool: &SqlitePool,
    owner_id: &str,
    new: &NewProject,
) -> Result<ProjectRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO projects (id, owner_id, name, description, status, start_date, end_date,
                              total_budget_cents, actual_expenditure_cents, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(owner_id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(new.status.as_str())
    .bind(&new.start_date)
    .bind(&new.end_date)
    .bind(new.total_budget_cents)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO team_members (project_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(owner_id)
        .bind(TeamRole::Owner.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    insert_history(
        &mut tx,
        HistoryEntry {
            project_id: &id,
            kind: BudgetEntryKind::BudgetSet,
            amount_delta_cents: new.total_budget_cents,
            total_budget_cents: new.total_budget_cents,
            actual_expenditure_cents: 0,
            note: Some("Initial budget"),
            user_id: Some(owner_id),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(ProjectRow {
        id,
        owner_id: owner_id.to_string(),
        name: new.name.clone(),
        description: new.description.clone(),
        status: new.status,
        start_date: new.start_date.clone(),
        end_date: new.end_date.clone(),
        total_budget_cents: new.total_budget_cents,
        actual_expenditure_cents: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Get a project by ID (with optional caching)
pub async fn get_project(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    id: &str,
) -> Result<Option<ProjectRow>, SqliteError> {
    if let Some(cache) = cache {
        let key = CacheKey::project(id);

        match cache.get::<ProjectRow>(&key).await {
            Ok(Some(project)) => {
                tracing::trace!(%id, "Project cache hit");
                return Ok(Some(project));
            }
            Err(e) => tracing::warn!(%id, error = %e, "Cache get error"),
            Ok(None) => {}
        }

        let mut conn = pool.acquire().await?;
        let result = fetch_project(&mut conn, id).await?;

        if let Some(ref proj) = result
            && let Err(e) = cache
                .set(&key, proj, Some(Duration::from_secs(CACHE_TTL_PROJECT)))
                .await
        {
            tracing::warn!(%id, error = %e, "Cache set error");
        }

        Ok(result)
    } else {
        let mut conn = pool.acquire().await?;
        fetch_project(&mut conn, id).await
    }
}

/// Read a project on an existing connection or transaction
pub(super) async fn fetch_project(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<ProjectRow>, SqliteError> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ?");
    let row = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(to_project))
}

/// List projects the user is a team member of, newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    status: Option<ProjectStatus>,
    page: u32,
    limit: u32,
) -> Result<(Vec<ProjectWithRole>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;
    let status = status.map(|s| s.as_str());

    let sql = format!(
        r#"
        SELECT {PROJECT_COLUMNS}, tm.role
        FROM projects p
        JOIN team_members tm ON tm.project_id = p.id
        WHERE tm.user_id = ? AND (? IS NULL OR p.status = ?)
        ORDER BY p.created_at DESC, p.id
        LIMIT ? OFFSET ?
        "#
    );

    let rows = sqlx::query_as::<_, ProjectRoleTuple>(&sql)
        .bind(user_id)
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM projects p
        JOIN team_members tm ON tm.project_id = p.id
        WHERE tm.user_id = ? AND (? IS NULL OR p.status = ?)
        "#,
    )
    .bind(user_id)
    .bind(status)
    .bind(status)
    .fetch_one(pool)
    .await?;

    let projects = rows
        .into_iter()
        .map(
            |(
                id,
                owner_id,
                name,
                description,
                status,
                start_date,
                end_date,
                total_budget_cents,
                actual_expenditure_cents,
                created_at,
                updated_at,
                role,
            )| ProjectWithRole {
                project: to_project((
                    id,
                    owner_id,
                    name,
                    description,
                    status,
                    start_date,
                    end_date,
                    total_budget_cents,
                    actual_expenditure_cents,
                    created_at,
                    updated_at,
                )),
                role: parse_column(&role, TeamRole::parse, TeamRole::Viewer, "role"),
            },
        )
        .collect();

    Ok((projects, total.0 as u64))
}

/// Apply a partial update. Returns the updated project if found.
pub async fn update_project(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    id: &str,
    update: &ProjectUpdate,
) -> Result<Option<ProjectRow>, SqliteError> {
    let mut tx = pool.begin().await?;

    let Some(mut project) = fetch_project(&mut tx, id).await? else {
        return Ok(None);
    };

    if let Some(name) = &update.name {
        project.name = name.clone();
    }
    if let Some(description) = &update.description {
        project.description = description.clone();
    }
    if let Some(status) = update.status {
        project.status = status;
    }
    if let Some(start_date) = &update.start_date {
        project.start_date = start_date.clone();
    }
    if let Some(end_date) = &update.end_date {
        project.end_date = end_date.clone();
    }
    project.updated_at = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        UPDATE projects
        SET name = ?, description = ?, status = ?, start_date = ?, end_date = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.as_str())
    .bind(&project.start_date)
    .bind(&project.end_date)
    .bind(project.updated_at)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Some(cache) = cache {
        cache.invalidate_key(&CacheKey::project(id)).await;
    }

    Ok(Some(project))
}

/// Delete a project and (by cascade) everything under it
pub async fn delete_project(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    id: &str,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;

    if deleted && let Some(cache) = cache {
        cache.invalidate_key(&CacheKey::project(id)).await;
        cache.invalidate(&CacheKey::members_of(id)).await;
    }

    Ok(deleted)
}

/// Open projects whose end date falls within `[from, to]` (ISO dates, inclusive)
pub async fn list_ending_between(
    pool: &SqlitePool,
    from: &str,
    to: &str,
) -> Result<Vec<ProjectRow>, SqliteError> {
    let sql = format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects p
        WHERE p.end_date IS NOT NULL
          AND p.end_date >= ? AND p.end_date <= ?
          AND p.status NOT IN ('completed', 'cancelled')
        ORDER BY p.end_date, p.id
        "#
    );

    let rows = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(to_project).collect())
}

/// Projects with a positive total budget (budget threshold sweep)
pub async fn list_with_budget(pool: &SqlitePool) -> Result<Vec<ProjectRow>, SqliteError> {
    let sql = format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.total_budget_cents > 0 ORDER BY p.id"
    );

    let rows = sqlx::query_as::<_, ProjectTuple>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(to_project).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{
        new_project, seed_project, seed_user, setup_test_pool,
    };

    #[tokio::test]
    async fn test_create_project_adds_owner_and_history() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;

        let project = create_project(&pool, &owner.id, &new_project("Apollo", 50_000))
            .await
            .unwrap();
        assert_eq!(project.owner_id, owner.id);
        assert_eq!(project.actual_expenditure_cents, 0);

        let role: String = sqlx::query_scalar(
            "SELECT role FROM team_members WHERE project_id = ? AND user_id = ?",
        )
        .bind(&project.id)
        .bind(&owner.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(role, "owner");

        let history: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM budget_history WHERE project_id = ?")
                .bind(&project.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(history, 1);
    }

    #[tokio::test]
    async fn test_get_project_not_found() {
        let pool = setup_test_pool().await;
        assert!(get_project(&pool, None, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_for_user_only_member_projects() {
        let pool = setup_test_pool().await;
        let alice = seed_user(&pool, "alice@example.com").await;
        let bob = seed_user(&pool, "bob@example.com").await;

        seed_project(&pool, &alice.id, 0).await;
        seed_project(&pool, &alice.id, 0).await;
        seed_project(&pool, &bob.id, 0).await;

        let (projects, total) = list_for_user(&pool, &alice.id, None, 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(projects.len(), 2);
        assert!(projects.iter().all(|p| p.role == TeamRole::Owner));

        let (projects, total) = list_for_user(&pool, &alice.id, None, 2, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(projects.len(), 1);
    }

    #[tokio::test]
    async fn test_list_for_user_status_filter() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        seed_project(&pool, &owner.id, 0).await;

        let update = ProjectUpdate {
            status: Some(ProjectStatus::Active),
            ..Default::default()
        };
        update_project(&pool, None, &project.id, &update)
            .await
            .unwrap();

        let (projects, total) =
            list_for_user(&pool, &owner.id, Some(ProjectStatus::Active), 1, 10)
                .await
                .unwrap();
        assert_eq!(total, 1);
        assert_eq!(projects[0].project.id, project.id);
    }

    #[tokio::test]
    async fn test_update_project_clears_nullable_fields() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let mut new = new_project("Gemini", 0);
        new.description = Some("first".to_string());
        let project = create_project(&pool, &owner.id, &new).await.unwrap();

        let update = ProjectUpdate {
            name: Some("Gemini II".to_string()),
            description: Some(None),
            ..Default::default()
        };
        let updated = update_project(&pool, None, &project.id, &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Gemini II");
        assert!(updated.description.is_none());

        let missing = update_project(&pool, None, "missing", &update).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let project = seed_project(&pool, &owner.id, 1000).await;

        assert!(delete_project(&pool, None, &project.id).await.unwrap());
        assert!(!delete_project(&pool, None, &project.id).await.unwrap());

        let members: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE project_id = ?")
                .bind(&project.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(members, 0);
    }

    #[tokio::test]
    async fn test_list_ending_between_skips_closed() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;

        let mut ending = new_project("Ending", 0);
        ending.end_date = Some("2026-03-05".to_string());
        let ending = create_project(&pool, &owner.id, &ending).await.unwrap();

        let mut closed = new_project("Closed", 0);
        closed.end_date = Some("2026-03-04".to_string());
        closed.status = ProjectStatus::Completed;
        create_project(&pool, &owner.id, &closed).await.unwrap();

        let mut later = new_project("Later", 0);
        later.end_date = Some("2026-03-20".to_string());
        create_project(&pool, &owner.id, &later).await.unwrap();

        let rows = list_ending_between(&pool, "2026-03-01", "2026-03-08")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ending.id);
    }
}
