//! Task attachment metadata repository
//!
//! One row per attachment. Bytes are content-addressed per project, so several
//! rows may share a `content_hash`; storage is released when the last row
//! referencing a hash is gone (see `count_hash_refs`).

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{NewTaskFile, TaskFileRow};

const FILE_COLUMNS: &str = "id, task_id, project_id, uploader_id, original_name, content_hash, \
     mime_type, size_bytes, created_at";

type FileTuple = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    i64,
    i64,
);

fn to_file(
    (
        id,
        task_id,
        project_id,
        uploader_id,
        original_name,
        content_hash,
        mime_type,
        size_bytes,
        created_at,
    ): FileTuple,
) -> TaskFileRow {
    TaskFileRow {
        id,
        task_id,
        project_id,
        uploader_id,
        original_name,
        content_hash,
        mime_type,
        size_bytes,
        created_at,
    }
}

pub async fn create_file(
    pool: &SqlitePool,
    project_id: &str,
    task_id: &str,
    uploader_id: &str,
    new: &NewTaskFile,
) -> Result<TaskFileRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO task_files (id, task_id, project_id, uploader_id, original_name, content_hash,
                                mime_type, size_bytes, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(task_id)
    .bind(project_id)
    .bind(uploader_id)
    .bind(&new.original_name)
    .bind(&new.content_hash)
    .bind(&new.mime_type)
    .bind(new.size_bytes)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(TaskFileRow {
        id,
        task_id: task_id.to_string(),
        project_id: project_id.to_string(),
        uploader_id: Some(uploader_id.to_string()),
        original_name: new.original_name.clone(),
        content_hash: new.content_hash.clone(),
        mime_type: new.mime_type.clone(),
        size_bytes: new.size_bytes,
        created_at: now,
    })
}

pub async fn get_file(
    pool: &SqlitePool,
    task_id: &str,
    file_id: &str,
) -> Result<Option<TaskFileRow>, SqliteError> {
    let sql = format!("SELECT {FILE_COLUMNS} FROM task_files WHERE id = ? AND task_id = ?");
    let row = sqlx::query_as::<_, FileTuple>(&sql)
        .bind(file_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(to_file))
}

/// Attachments of a task, newest first
pub async fn list_files(pool: &SqlitePool, task_id: &str) -> Result<Vec<TaskFileRow>, SqliteError> {
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM task_files WHERE task_id = ? ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query_as::<_, FileTuple>(&sql)
        .bind(task_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(to_file).collect())
}

/// Delete an attachment row. Returns the deleted row so the caller can
/// release its bytes.
pub async fn delete_file(
    pool: &SqlitePool,
    task_id: &str,
    file_id: &str,
) -> Result<Option<TaskFileRow>, SqliteError> {
    let sql = format!("DELETE FROM task_files WHERE id = ? AND task_id = ? RETURNING {FILE_COLUMNS}");
    let row = sqlx::query_as::<_, FileTuple>(&sql)
        .bind(file_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(to_file))
}

/// Number of attachment rows in a project that still reference a hash
pub async fn count_hash_refs(
    pool: &SqlitePool,
    project_id: &str,
    content_hash: &str,
) -> Result<i64, SqliteError> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM task_files WHERE project_id = ? AND content_hash = ?",
    )
    .bind(project_id)
    .bind(content_hash)
    .fetch_one(pool)
    .await?;

    Ok(count.0)
}

/// Total attachment bytes of a project (reports)
pub async fn storage_bytes(pool: &SqlitePool, project_id: &str) -> Result<i64, SqliteError> {
    let total: (Option<i64>,) =
        sqlx::query_as("SELECT SUM(size_bytes) FROM task_files WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(pool)
            .await?;

    Ok(total.0.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{
        seed_project, seed_task, seed_user, setup_test_pool,
    };

    fn new_file(name: &str, hash_char: char, size: i64) -> NewTaskFile {
        NewTaskFile {
            original_name: name.to_string(),
            content_hash: std::iter::repeat_n(hash_char, 64).collect(),
            mime_type: "text/plain".to_string(),
            size_bytes: size,
        }
    }

    #[tokio::test]
    async fn test_file_rows_share_hash() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;
        let task = seed_task(&pool, &project.id, &owner.id).await;

        let a = create_file(&pool, &project.id, &task.id, &owner.id, &new_file("a.txt", 'a', 10))
            .await
            .unwrap();
        let b = create_file(&pool, &project.id, &task.id, &owner.id, &new_file("b.txt", 'a', 10))
            .await
            .unwrap();
        assert_eq!(count_hash_refs(&pool, &project.id, &a.content_hash).await.unwrap(), 2);
        assert_eq!(list_files(&pool, &task.id).await.unwrap().len(), 2);
        assert_eq!(storage_bytes(&pool, &project.id).await.unwrap(), 20);

        let removed = delete_file(&pool, &task.id, &a.id).await.unwrap().unwrap();
        assert_eq!(removed.original_name, "a.txt");
        assert_eq!(count_hash_refs(&pool, &project.id, &a.content_hash).await.unwrap(), 1);

        assert!(delete_file(&pool, &task.id, &a.id).await.unwrap().is_none());
        let remaining = get_file(&pool, &task.id, &b.id).await.unwrap().unwrap();
        assert_eq!(remaining.size_bytes, 10);
    }
}
