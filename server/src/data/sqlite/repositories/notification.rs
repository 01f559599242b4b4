//! Notification repository
//!
//! Notifications point at their subject through `(subject_type, subject_id)`
//! without a foreign key, so rows can outlive the subject. Invitation
//! subjects are swept by `delete_orphaned_invitation_notifications`.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{NewNotification, NotificationRow, SubjectType};

use super::parse_column;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, subject_type, subject_id, payload, read_at, created_at";

type NotificationTuple = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<i64>,
    i64,
);

fn to_notification(
    (id, user_id, kind, subject_type, subject_id, payload, read_at, created_at): NotificationTuple,
) -> NotificationRow {
    let payload = serde_json::from_str(&payload).unwrap_or_else(|e| {
        tracing::warn!(%id, error = %e, "Invalid notification payload");
        serde_json::Value::Null
    });
    NotificationRow {
        id,
        user_id,
        kind,
        subject_type: parse_column(
            &subject_type,
            SubjectType::parse,
            SubjectType::Project,
            "subject_type",
        ),
        subject_id,
        payload,
        read_at,
        created_at,
    }
}

/// Insert a batch of notifications in one transaction
pub async fn create_many(
    pool: &SqlitePool,
    batch: &[NewNotification],
) -> Result<Vec<NotificationRow>, SqliteError> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;
    let mut created = Vec::with_capacity(batch.len());

    for new in batch {
        let id = cuid2::create_id();
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, subject_type, subject_id, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.user_id)
        .bind(&new.kind)
        .bind(new.subject_type.as_str())
        .bind(&new.subject_id)
        .bind(new.payload.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        created.push(NotificationRow {
            id,
            user_id: new.user_id.clone(),
            kind: new.kind.clone(),
            subject_type: new.subject_type,
            subject_id: new.subject_id.clone(),
            payload: new.payload.clone(),
            read_at: None,
            created_at: now,
        });
    }

    tx.commit().await?;
    Ok(created)
}

/// Notifications of a user, newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    unread_only: bool,
    page: u32,
    limit: u32,
) -> Result<(Vec<NotificationRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;

    let sql = format!(
        r#"
        SELECT {NOTIFICATION_COLUMNS}
        FROM notifications
        WHERE user_id = ? AND (? = 0 OR read_at IS NULL)
        ORDER BY created_at DESC, rowid DESC
        LIMIT ? OFFSET ?
        "#
    );
    let rows = sqlx::query_as::<_, NotificationTuple>(&sql)
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND (? = 0 OR read_at IS NULL)",
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_one(pool)
    .await?;

    Ok((rows.into_iter().map(to_notification).collect(), total.0 as u64))
}

pub async fn count_unread(pool: &SqlitePool, user_id: &str) -> Result<u64, SqliteError> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read_at IS NULL")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(count.0 as u64)
}

/// Mark one notification read. Returns None if it does not belong to the user.
pub async fn mark_read(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<Option<NotificationRow>, SqliteError> {
    let sql = format!(
        r#"
        UPDATE notifications
        SET read_at = COALESCE(read_at, ?)
        WHERE id = ? AND user_id = ?
        RETURNING {NOTIFICATION_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, NotificationTuple>(&sql)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(to_notification))
}

/// Returns the number of notifications newly marked read
pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> Result<u64, SqliteError> {
    let result =
        sqlx::query("UPDATE notifications SET read_at = ? WHERE user_id = ? AND read_at IS NULL")
            .bind(chrono::Utc::now().timestamp())
            .bind(user_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}

pub async fn delete_notification(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete invitation notifications whose invitation no longer exists,
/// optionally only for one recipient. Returns the number deleted.
pub async fn delete_orphaned_invitation_notifications(
    pool: &SqlitePool,
    user_id: Option<&str>,
) -> Result<u64, SqliteError> {
    let result = sqlx::query(
        r#"
        DELETE FROM notifications
        WHERE subject_type = 'invitation'
          AND (? IS NULL OR user_id = ?)
          AND NOT EXISTS (SELECT 1 FROM team_invitations i WHERE i.id = notifications.subject_id)
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::invitation;
    use crate::data::sqlite::repositories::test_support::{seed_project, seed_user, setup_test_pool};
    use crate::data::types::TeamRole;

    fn note(user_id: &str, subject_type: SubjectType, subject_id: &str) -> NewNotification {
        NewNotification {
            user_id: user_id.to_string(),
            kind: "test".to_string(),
            subject_type,
            subject_id: subject_id.to_string(),
            payload: serde_json::json!({ "kind": "test" }),
        }
    }

    #[tokio::test]
    async fn test_read_state() {
        let pool = setup_test_pool().await;
        let user = seed_user(&pool, "user@example.com").await;
        let other = seed_user(&pool, "other@example.com").await;

        let created = create_many(
            &pool,
            &[
                note(&user.id, SubjectType::Task, "t1"),
                note(&user.id, SubjectType::Task, "t2"),
                note(&other.id, SubjectType::Task, "t3"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(count_unread(&pool, &user.id).await.unwrap(), 2);

        // Not the recipient
        assert!(mark_read(&pool, &other.id, &created[0].id).await.unwrap().is_none());

        let read = mark_read(&pool, &user.id, &created[0].id).await.unwrap().unwrap();
        assert!(read.read_at.is_some());
        assert_eq!(read.payload["kind"], "test");

        let (unread, total) = list_for_user(&pool, &user.id, true, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(unread[0].subject_id, "t2");

        assert_eq!(mark_all_read(&pool, &user.id).await.unwrap(), 1);
        assert_eq!(count_unread(&pool, &user.id).await.unwrap(), 0);
        let (_, total) = list_for_user(&pool, &user.id, false, 1, 10).await.unwrap();
        assert_eq!(total, 2);

        assert!(delete_notification(&pool, &user.id, &created[1].id).await.unwrap());
        assert!(!delete_notification(&pool, &user.id, &created[2].id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_removes_exactly_orphans() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let project = seed_project(&pool, &owner.id, 0).await;

        let live = invitation::create_invitation(
            &pool,
            &project.id,
            &owner.id,
            &guest.email,
            TeamRole::Member,
            None,
        )
        .await
        .unwrap();
        let revoked = invitation::create_invitation(
            &pool,
            &project.id,
            &owner.id,
            "someone@example.com",
            TeamRole::Member,
            None,
        )
        .await
        .unwrap();

        create_many(
            &pool,
            &[
                note(&guest.id, SubjectType::Invitation, &live.id),
                note(&guest.id, SubjectType::Invitation, &revoked.id),
                note(&owner.id, SubjectType::Invitation, &revoked.id),
                // Task subjects are never touched even if the id is unknown
                note(&guest.id, SubjectType::Task, "missing-task"),
            ],
        )
        .await
        .unwrap();

        invitation::delete_invitation(&pool, &project.id, &revoked.id)
            .await
            .unwrap();

        let removed = delete_orphaned_invitation_notifications(&pool, Some(&guest.id))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let removed = delete_orphaned_invitation_notifications(&pool, None)
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let (remaining, _) = list_for_user(&pool, &guest.id, false, 1, 10).await.unwrap();
        let mut subjects: Vec<_> = remaining.iter().map(|n| n.subject_id.as_str()).collect();
        subjects.sort();
        let mut expected = vec![live.id.as_str(), "missing-task"];
        expected.sort();
        assert_eq!(subjects, expected);
    }
}
