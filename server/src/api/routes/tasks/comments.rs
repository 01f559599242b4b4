//! Task comment endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::TaskPath;
use super::types::{CommentDto, CommentRequest};
use crate::api::auth::{ProjectRead, ProjectWrite};
use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::routes::ApiState;
use crate::api::routes::projects::types::PageQuery;
use crate::api::types::{ApiError, PaginatedResponse};
use crate::data::types::{CommentRow, NewActivity};
use crate::domain::activity::Action;

#[derive(Deserialize)]
pub struct CommentPath {
    pub task_id: String,
    pub comment_id: String,
}

fn comment_not_found(comment_id: &str) -> ApiError {
    ApiError::not_found(
        "COMMENT_NOT_FOUND",
        format!("Comment not found: {}", comment_id),
    )
}

async fn load_comment(
    state: &ApiState,
    project_id: &str,
    path: &CommentPath,
) -> Result<CommentRow, ApiError> {
    let task = state.load_task(project_id, &path.task_id).await?;
    state
        .database
        .repository()
        .get_comment(&task.id, &path.comment_id)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| comment_not_found(&path.comment_id))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/comments",
    tag = "comments",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "Comments, oldest first"))
)]
pub async fn list_comments(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<TaskPath>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Json<PaginatedResponse<CommentDto>>, ApiError> {
    let task = state.load_task(&access.project_id, &path.task_id).await?;
    let (rows, total) = state
        .database
        .repository()
        .list_comments(&task.id, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(CommentDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

/// Add a comment; assignees and the project owner are notified
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/comments",
    tag = "comments",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentDto),
        (status = 404, description = "Task not found")
    )
)]
pub async fn create_comment(
    State(state): State<ApiState>,
    access: ProjectWrite,
    Path(path): Path<TaskPath>,
    ValidatedJson(body): ValidatedJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentDto>), ApiError> {
    let project = state.load_project(&access.project_id).await?;
    let task = state.load_task(&access.project_id, &path.task_id).await?;

    let comment = state
        .database
        .repository()
        .create_comment(&task.id, &access.user_id, body.body.trim())
        .await
        .map_err(ApiError::from_data)?;

    state.notifier.comment_added(&project, &task, &comment).await;
    state
        .record(
            NewActivity::new(Action::CommentAdded, &access.user_id)
                .project(&project.id)
                .task(&task.id)
                .metadata(json!({ "comment_id": comment.id })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(CommentDto::from(comment))))
}

/// Edit a comment (author only)
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID"),
        ("comment_id" = String, Path, description = "Comment ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentDto),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn update_comment(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<CommentPath>,
    ValidatedJson(body): ValidatedJson<CommentRequest>,
) -> Result<Json<CommentDto>, ApiError> {
    let comment = load_comment(&state, &access.project_id, &path).await?;
    if comment.user_id != access.user_id {
        return Err(ApiError::forbidden(
            "NOT_AUTHOR",
            "Only the author can edit a comment",
        ));
    }

    let updated = state
        .database
        .repository()
        .update_comment(&comment.task_id, &comment.id, body.body.trim())
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| comment_not_found(&comment.id))?;

    state
        .record(
            NewActivity::new(Action::CommentUpdated, &access.user_id)
                .project(&access.project_id)
                .task(&updated.task_id)
                .metadata(json!({ "comment_id": updated.id })),
        )
        .await;

    Ok(Json(CommentDto::from(updated)))
}

/// Delete a comment (author, or manager and above)
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID"),
        ("comment_id" = String, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Not the author or a manager"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<CommentPath>,
) -> Result<StatusCode, ApiError> {
    let comment = load_comment(&state, &access.project_id, &path).await?;
    if comment.user_id != access.user_id && !access.is_manager() {
        return Err(ApiError::forbidden(
            "NOT_AUTHOR",
            "Only the author or a project manager can delete a comment",
        ));
    }

    let deleted = state
        .database
        .repository()
        .delete_comment(&comment.task_id, &comment.id)
        .await
        .map_err(ApiError::from_data)?;
    if !deleted {
        return Err(comment_not_found(&comment.id));
    }

    state
        .record(
            NewActivity::new(Action::CommentDeleted, &access.user_id)
                .project(&access.project_id)
                .task(&comment.task_id)
                .metadata(json!({ "comment_id": comment.id, "author_id": comment.user_id })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;
    use crate::data::types::TeamRole;

    #[tokio::test]
    async fn test_comment_flow_and_permissions() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (alice, alice_token) = app.user("alice@example.com").await;
        let (bob, bob_token) = app.user("bob@example.com").await;
        let project_id = app.project(&owner, 0).await;
        app.join(&project_id, &alice.id, TeamRole::Member).await;
        app.join(&project_id, &bob.id, TeamRole::Member).await;
        let task_id = app.task(&owner, &project_id, "Review").await;
        let base = format!("/api/v1/projects/{project_id}/tasks/{task_id}/comments");

        let (status, body) = app
            .post(&base, &alice_token, json!({ "body": "Looks good" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["author_name"], "alice");
        let comment_id = body["id"].as_str().unwrap().to_string();
        let uri = format!("{base}/{comment_id}");

        // Project owner is notified, the author is not
        let (_, body) = app.get("/api/v1/notifications", &owner).await;
        assert_eq!(body["data"][0]["kind"], "comment_added");
        let (_, body) = app.get("/api/v1/notifications/unread-count", &alice_token).await;
        assert_eq!(body["count"], 0);

        let (status, body) = app.put(&uri, &bob_token, json!({ "body": "hijack" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_AUTHOR");

        let (status, body) = app
            .put(&uri, &alice_token, json!({ "body": "Looks great" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"], "Looks great");

        let (status, _) = app.delete(&uri, &bob_token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Owner moderates
        let (status, _) = app.delete(&uri, &owner).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = app.get(&base, &alice_token).await;
        assert_eq!(body["meta"]["total_items"], 0);
    }

    #[tokio::test]
    async fn test_empty_comment_rejected() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let project_id = app.project(&owner, 0).await;
        let task_id = app.task(&owner, &project_id, "Review").await;

        let (status, body) = app
            .post(
                &format!("/api/v1/projects/{project_id}/tasks/{task_id}/comments"),
                &owner,
                json!({ "body": "" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["body"].is_array());
    }
}
