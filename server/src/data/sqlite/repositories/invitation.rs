//! Team invitation repository
//!
//! At most one pending invitation exists per (project, email); the partial
//! unique index turns a second one into `SqliteError::Conflict`.

use sqlx::SqlitePool;

use crate::data::cache::{CacheService, invalidate_membership};
use crate::data::sqlite::SqliteError;
use crate::data::types::{InvitationResponse, InvitationRow, InvitationStatus, TeamRole};

use super::parse_column;

const INVITATION_SELECT: &str = r#"
    SELECT i.id, i.project_id, p.name, i.inviter_id, i.email, i.role, i.status, i.message,
           i.created_at, i.responded_at
    FROM team_invitations i
    JOIN projects p ON p.id = i.project_id
"#;

type InvitationTuple = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    i64,
    Option<i64>,
);

fn to_invitation(
    (
        id,
        project_id,
        project_name,
        inviter_id,
        email,
        role,
        status,
        message,
        created_at,
        responded_at,
    ): InvitationTuple,
) -> InvitationRow {
    InvitationRow {
        id,
        project_id,
        project_name,
        inviter_id,
        email,
        role: parse_column(&role, TeamRole::parse, TeamRole::Viewer, "role"),
        status: parse_column(
            &status,
            InvitationStatus::parse,
            InvitationStatus::Pending,
            "status",
        ),
        message,
        created_at,
        responded_at,
    }
}

/// Create a pending invitation. The email is stored lowercased.
pub async fn create_invitation(
    pool: &SqlitePool,
    project_id: &str,
    inviter_id: &str,
    email: &str,
    role: TeamRole,
    message: Option<&str>,
) -> Result<InvitationRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();
    let email = email.trim().to_lowercase();

    sqlx::query(
        r#"
        INSERT INTO team_invitations (id, project_id, inviter_id, email, role, status, message, created_at)
        VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(inviter_id)
    .bind(&email)
    .bind(role.as_str())
    .bind(message)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| SqliteError::unique_or(e, "A pending invitation already exists for this email"))?;

    get_invitation(pool, &id)
        .await?
        .ok_or(SqliteError::Database(sqlx::Error::RowNotFound))
}

pub async fn get_invitation(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<InvitationRow>, SqliteError> {
    let sql = format!("{INVITATION_SELECT} WHERE i.id = ?");
    let row = sqlx::query_as::<_, InvitationTuple>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(to_invitation))
}

/// Invitations of a project, newest first
pub async fn list_for_project(
    pool: &SqlitePool,
    project_id: &str,
    status: Option<InvitationStatus>,
) -> Result<Vec<InvitationRow>, SqliteError> {
    let status = status.map(|s| s.as_str());
    let sql = format!(
        "{INVITATION_SELECT} WHERE i.project_id = ? AND (? IS NULL OR i.status = ?) ORDER BY i.created_at DESC, i.id"
    );
    let rows = sqlx::query_as::<_, InvitationTuple>(&sql)
        .bind(project_id)
        .bind(status)
        .bind(status)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(to_invitation).collect())
}

/// Pending invitations addressed to an email
pub async fn list_pending_for_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Vec<InvitationRow>, SqliteError> {
    let sql = format!(
        "{INVITATION_SELECT} WHERE i.email = ? AND i.status = 'pending' ORDER BY i.created_at DESC, i.id"
    );
    let rows = sqlx::query_as::<_, InvitationTuple>(&sql)
        .bind(email.trim().to_lowercase())
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(to_invitation).collect())
}

/// Revoke an invitation by deleting it
pub async fn delete_invitation(
    pool: &SqlitePool,
    project_id: &str,
    id: &str,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM team_invitations WHERE id = ? AND project_id = ?")
        .bind(id)
        .bind(project_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Accept or decline an invitation on behalf of `user_id`.
///
/// Only the user whose email the invitation was sent to may respond, and only
/// while it is pending. Accepting inserts the membership in the same
/// transaction; an existing membership is left as-is.
pub async fn respond(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    id: &str,
    user_id: &str,
    user_email: &str,
    accept: bool,
) -> Result<InvitationResponse, SqliteError> {
    let mut tx = pool.begin().await?;

    let sql = format!("{INVITATION_SELECT} WHERE i.id = ?");
    let row = sqlx::query_as::<_, InvitationTuple>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(mut invitation) = row.map(to_invitation) else {
        return Ok(InvitationResponse::NotFound);
    };
    if !invitation.email.eq_ignore_ascii_case(user_email.trim()) {
        return Ok(InvitationResponse::NotRecipient);
    }
    if invitation.status != InvitationStatus::Pending {
        return Ok(InvitationResponse::NotPending(invitation.status));
    }

    let now = chrono::Utc::now().timestamp();
    let status = if accept {
        InvitationStatus::Accepted
    } else {
        InvitationStatus::Declined
    };

    sqlx::query("UPDATE team_invitations SET status = ?, responded_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if accept {
        sqlx::query(
            r#"
            INSERT INTO team_members (project_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(project_id, user_id) DO NOTHING
            "#,
        )
        .bind(&invitation.project_id)
        .bind(user_id)
        .bind(invitation.role.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if accept && let Some(cache) = cache {
        invalidate_membership(cache, &invitation.project_id, user_id).await;
    }

    invitation.status = status;
    invitation.responded_at = Some(now);
    Ok(InvitationResponse::Responded(invitation))
}
