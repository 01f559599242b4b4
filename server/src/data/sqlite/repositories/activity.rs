//! Activity log repository (append-only)

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{ActivityFilter, ActivityRow, NewActivity};

const ACTIVITY_COLUMNS: &str = "id, user_id, project_id, task_id, action, metadata, created_at";

type ActivityTuple = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
    i64,
);

fn to_activity(
    (id, user_id, project_id, task_id, action, metadata, created_at): ActivityTuple,
) -> ActivityRow {
    let metadata = serde_json::from_str(&metadata).unwrap_or_else(|e| {
        tracing::warn!(%id, error = %e, "Invalid activity metadata");
        serde_json::Value::Null
    });
    ActivityRow {
        id,
        user_id,
        project_id,
        task_id,
        action,
        metadata,
        created_at,
    }
}

pub async fn log_activity(
    pool: &SqlitePool,
    entry: &NewActivity,
) -> Result<ActivityRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO activity_logs (id, user_id, project_id, task_id, action, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&entry.user_id)
    .bind(&entry.project_id)
    .bind(&entry.task_id)
    .bind(&entry.action)
    .bind(entry.metadata.to_string())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ActivityRow {
        id,
        user_id: entry.user_id.clone(),
        project_id: entry.project_id.clone(),
        task_id: entry.task_id.clone(),
        action: entry.action.clone(),
        metadata: entry.metadata.clone(),
        created_at: now,
    })
}

/// Activity of a project, newest first
pub async fn list_for_project(
    pool: &SqlitePool,
    project_id: &str,
    filter: &ActivityFilter,
    page: u32,
    limit: u32,
) -> Result<(Vec<ActivityRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;
    let action = filter.action.as_deref();
    let task_id = filter.task_id.as_deref();

    let sql = format!(
        r#"
        SELECT {ACTIVITY_COLUMNS}
        FROM activity_logs
        WHERE project_id = ?
          AND (? IS NULL OR action = ?)
          AND (? IS NULL OR task_id = ?)
        ORDER BY created_at DESC, rowid DESC
        LIMIT ? OFFSET ?
        "#
    );
    let rows = sqlx::query_as::<_, ActivityTuple>(&sql)
        .bind(project_id)
        .bind(action)
        .bind(action)
        .bind(task_id)
        .bind(task_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM activity_logs
        WHERE project_id = ?
          AND (? IS NULL OR action = ?)
          AND (? IS NULL OR task_id = ?)
        "#,
    )
    .bind(project_id)
    .bind(action)
    .bind(action)
    .bind(task_id)
    .bind(task_id)
    .fetch_one(pool)
    .await?;

    Ok((rows.into_iter().map(to_activity).collect(), total.0 as u64))
}

/// Activity performed by a user, newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    page: u32,
    limit: u32,
) -> Result<(Vec<ActivityRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;

    let sql = format!(
        "SELECT {ACTIVITY_COLUMNS} FROM activity_logs WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, ActivityTuple>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_logs WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok((rows.into_iter().map(to_activity).collect(), total.0 as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{seed_project, seed_user, setup_test_pool};

    fn entry(user_id: &str, project_id: &str, action: &str, task_id: Option<&str>) -> NewActivity {
        NewActivity {
            user_id: Some(user_id.to_string()),
            project_id: Some(project_id.to_string()),
            task_id: task_id.map(String::from),
            action: action.to_string(),
            metadata: serde_json::json!({ "n": 1 }),
        }
    }

    #[tokio::test]
    async fn test_log_and_filter() {
        let pool = setup_test_pool().await;
        let user = seed_user(&pool, "user@example.com").await;
        let project = seed_project(&pool, &user.id, 0).await;

        log_activity(&pool, &entry(&user.id, &project.id, "project_created", None))
            .await
            .unwrap();
        log_activity(&pool, &entry(&user.id, &project.id, "task_created", Some("t1")))
            .await
            .unwrap();
        log_activity(&pool, &entry(&user.id, &project.id, "task_updated", Some("t1")))
            .await
            .unwrap();

        let (all, total) = list_for_project(&pool, &project.id, &ActivityFilter::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].action, "task_updated");
        assert_eq!(all[0].metadata["n"], 1);

        let filter = ActivityFilter {
            task_id: Some("t1".to_string()),
            ..Default::default()
        };
        let (_, total) = list_for_project(&pool, &project.id, &filter, 1, 10).await.unwrap();
        assert_eq!(total, 2);

        let filter = ActivityFilter {
            action: Some("project_created".to_string()),
            ..Default::default()
        };
        let (rows, _) = list_for_project(&pool, &project.id, &filter, 1, 10).await.unwrap();
        assert_eq!(rows.len(), 1);

        let (mine, total) = list_for_user(&pool, &user.id, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(mine.len(), 2);
    }
}
