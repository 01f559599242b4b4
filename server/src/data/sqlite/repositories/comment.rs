//! Task comment repository

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::CommentRow;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.task_id, c.user_id, u.name, c.body, c.created_at, c.updated_at
    FROM task_comments c
    JOIN users u ON u.id = c.user_id
"#;

type CommentTuple = (String, String, String, String, String, i64, i64);

fn to_comment(
    (id, task_id, user_id, author_name, body, created_at, updated_at): CommentTuple,
) -> CommentRow {
    CommentRow {
        id,
        task_id,
        user_id,
        author_name,
        body,
        created_at,
        updated_at,
    }
}

pub async fn create_comment(
    pool: &SqlitePool,
    task_id: &str,
    user_id: &str,
    body: &str,
) -> Result<CommentRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO task_comments (id, task_id, user_id, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(task_id)
    .bind(user_id)
    .bind(body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_comment(pool, task_id, &id)
        .await?
        .ok_or(SqliteError::Database(sqlx::Error::RowNotFound))
}

pub async fn get_comment(
    pool: &SqlitePool,
    task_id: &str,
    comment_id: &str,
) -> Result<Option<CommentRow>, SqliteError> {
    let sql = format!("{COMMENT_SELECT} WHERE c.id = ? AND c.task_id = ?");
    let row = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(comment_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(to_comment))
}

/// Comments of a task in posting order
pub async fn list_comments(
    pool: &SqlitePool,
    task_id: &str,
    page: u32,
    limit: u32,
) -> Result<(Vec<CommentRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;

    let sql = format!("{COMMENT_SELECT} WHERE c.task_id = ? ORDER BY c.created_at ASC, c.rowid ASC LIMIT ? OFFSET ?");
    let rows = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(task_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_comments WHERE task_id = ?")
        .bind(task_id)
        .fetch_one(pool)
        .await?;

    Ok((rows.into_iter().map(to_comment).collect(), total.0 as u64))
}

pub async fn update_comment(
    pool: &SqlitePool,
    task_id: &str,
    comment_id: &str,
    body: &str,
) -> Result<Option<CommentRow>, SqliteError> {
    let result =
        sqlx::query("UPDATE task_comments SET body = ?, updated_at = ? WHERE id = ? AND task_id = ?")
            .bind(body)
            .bind(chrono::Utc::now().timestamp())
            .bind(comment_id)
            .bind(task_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_comment(pool, task_id, comment_id).await
}

pub async fn delete_comment(
    pool: &SqlitePool,
    task_id: &str,
    comment_id: &str,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM task_comments WHERE id = ? AND task_id = ?")
        .bind(comment_id)
        .bind(task_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{
        seed_project, seed_task, seed_user, setup_test_pool,
    };

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        let task = seed_task(&pool, &project.id, &owner.id).await;

        let first = create_comment(&pool, &task.id, &owner.id, "First").await.unwrap();
        assert_eq!(first.author_name, "owner");
        create_comment(&pool, &task.id, &owner.id, "Second").await.unwrap();

        let (comments, total) = list_comments(&pool, &task.id, 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(comments[0].body, "First");

        let edited = update_comment(&pool, &task.id, &first.id, "Edited")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.body, "Edited");

        assert!(delete_comment(&pool, &task.id, &first.id).await.unwrap());
        assert!(
            update_comment(&pool, &task.id, &first.id, "gone")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_comments_cascade_with_task() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        let task = seed_task(&pool, &project.id, &owner.id).await;
        let comment = create_comment(&pool, &task.id, &owner.id, "hi").await.unwrap();

        super::super::task::delete_task(&pool, &project.id, &task.id)
            .await
            .unwrap();
        assert!(get_comment(&pool, &task.id, &comment.id).await.unwrap().is_none());
    }
}
