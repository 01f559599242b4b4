//! Notification inbox endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::ApiState;
use crate::api::auth::Auth;
use crate::api::extractors::ValidatedQuery;
use crate::api::types::{
    ApiError, PaginatedResponse, datetime, default_limit, default_page, validate_limit,
    validate_page,
};
use crate::data::types::{NotificationRow, SubjectType};

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationDto {
    pub id: String,
    pub kind: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    /// Kind-specific display data
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationDto {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            subject_type: row.subject_type,
            subject_id: row.subject_id,
            payload: row.payload,
            read: row.read_at.is_some(),
            read_at: row.read_at.map(datetime),
            created_at: datetime(row.created_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListNotificationsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdatedCount {
    pub updated: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedCount {
    pub deleted: u64,
}

#[derive(Deserialize)]
pub struct NotificationPath {
    pub notification_id: String,
}

pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/cleanup", post(cleanup))
        .route("/{notification_id}", delete(delete_notification))
        .route("/{notification_id}/read", post(mark_read))
        .with_state(state)
}

fn notification_not_found(id: &str) -> ApiError {
    ApiError::not_found(
        "NOTIFICATION_NOT_FOUND",
        format!("Notification not found: {}", id),
    )
}

/// List the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page"),
        ("unread_only" = Option<bool>, Query, description = "Only unread notifications")
    ),
    responses((status = 200, description = "Notifications"))
)]
pub async fn list_notifications(
    State(state): State<ApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<ListNotificationsQuery>,
) -> Result<Json<PaginatedResponse<NotificationDto>>, ApiError> {
    let (rows, total) = state
        .database
        .repository()
        .list_notifications(auth.user_id(), query.unread_only, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(NotificationDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "notifications",
    responses((status = 200, description = "Unread count", body = UnreadCount))
)]
pub async fn unread_count(
    State(state): State<ApiState>,
    auth: Auth,
) -> Result<Json<UnreadCount>, ApiError> {
    let count = state
        .database
        .repository()
        .count_unread_notifications(auth.user_id())
        .await
        .map_err(ApiError::from_data)?;
    Ok(Json(UnreadCount { count }))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "notifications",
    params(("notification_id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read", body = NotificationDto),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(
    State(state): State<ApiState>,
    auth: Auth,
    Path(path): Path<NotificationPath>,
) -> Result<Json<NotificationDto>, ApiError> {
    let row = state
        .database
        .repository()
        .mark_notification_read(auth.user_id(), &path.notification_id)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| notification_not_found(&path.notification_id))?;
    Ok(Json(NotificationDto::from(row)))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "notifications",
    responses((status = 200, description = "Number of notifications marked read", body = UpdatedCount))
)]
pub async fn mark_all_read(
    State(state): State<ApiState>,
    auth: Auth,
) -> Result<Json<UpdatedCount>, ApiError> {
    let updated = state
        .database
        .repository()
        .mark_all_notifications_read(auth.user_id())
        .await
        .map_err(ApiError::from_data)?;
    Ok(Json(UpdatedCount { updated }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{notification_id}",
    tag = "notifications",
    params(("notification_id" = String, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn delete_notification(
    State(state): State<ApiState>,
    auth: Auth,
    Path(path): Path<NotificationPath>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .database
        .repository()
        .delete_notification(auth.user_id(), &path.notification_id)
        .await
        .map_err(ApiError::from_data)?;
    if !deleted {
        return Err(notification_not_found(&path.notification_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Drop the caller's invitation notifications whose invitation was revoked
#[utoipa::path(
    post,
    path = "/api/v1/notifications/cleanup",
    tag = "notifications",
    responses((status = 200, description = "Number of notifications removed", body = DeletedCount))
)]
pub async fn cleanup(
    State(state): State<ApiState>,
    auth: Auth,
) -> Result<Json<DeletedCount>, ApiError> {
    let deleted = state
        .database
        .repository()
        .delete_orphaned_invitation_notifications(Some(auth.user_id()))
        .await
        .map_err(ApiError::from_data)?;

    tracing::debug!(user_id = %auth.user_id(), deleted, "Orphaned invitation notifications removed");
    Ok(Json(DeletedCount { deleted }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;
    use crate::data::types::TeamRole;

    #[tokio::test]
    async fn test_read_state() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (alice, alice_token) = app.user("alice@example.com").await;
        let project_id = app.project(&owner, 0).await;
        app.join(&project_id, &alice.id, TeamRole::Member).await;

        for title in ["One", "Two"] {
            let task_id = app.task(&owner, &project_id, title).await;
            let (status, _) = app
                .post(
                    &format!("/api/v1/projects/{project_id}/tasks/{task_id}/assignees"),
                    &owner,
                    json!({ "user_id": alice.id }),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = app.get("/api/v1/notifications/unread-count", &alice_token).await;
        assert_eq!(body["count"], 2);

        let (_, body) = app.get("/api/v1/notifications", &alice_token).await;
        let first = body["data"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"][0]["read"], false);

        let (status, body) = app
            .post(&format!("/api/v1/notifications/{first}/read"), &alice_token, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["read"], true);

        let (_, body) = app.get("/api/v1/notifications?unread_only=true", &alice_token).await;
        assert_eq!(body["meta"]["total_items"], 1);

        // Other users cannot touch the notification
        let (status, _) = app
            .post(&format!("/api/v1/notifications/{first}/read"), &owner, json!({}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = app.post("/api/v1/notifications/read-all", &alice_token, json!({})).await;
        assert_eq!(body["updated"], 1);
        let (_, body) = app.get("/api/v1/notifications/unread-count", &alice_token).await;
        assert_eq!(body["count"], 0);

        let (status, _) = app
            .delete(&format!("/api/v1/notifications/{first}"), &alice_token)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = app.get("/api/v1/notifications", &alice_token).await;
        assert_eq!(body["meta"]["total_items"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_revoked_invitations() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (_, guest) = app.user("guest@example.com").await;
        let project_id = app.project(&owner, 0).await;
        let base = format!("/api/v1/projects/{project_id}/invitations");

        let (_, kept) = app.post(&base, &owner, json!({ "email": "guest@example.com" })).await;
        let second = app.project(&owner, 0).await;
        let (_, revoked) = app
            .post(
                &format!("/api/v1/projects/{second}/invitations"),
                &owner,
                json!({ "email": "guest@example.com" }),
            )
            .await;
        let revoked_id = revoked["id"].as_str().unwrap();
        app.delete(&format!("/api/v1/projects/{second}/invitations/{revoked_id}"), &owner)
            .await;

        let (_, body) = app.get("/api/v1/notifications", &guest).await;
        assert_eq!(body["meta"]["total_items"], 2);

        let (status, body) = app.post("/api/v1/notifications/cleanup", &guest, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);

        let (_, body) = app.get("/api/v1/notifications", &guest).await;
        assert_eq!(body["meta"]["total_items"], 1);
        assert_eq!(body["data"][0]["subject_id"], kept["id"]);

        let (_, body) = app.post("/api/v1/notifications/cleanup", &guest, json!({})).await;
        assert_eq!(body["deleted"], 0);
    }
}
