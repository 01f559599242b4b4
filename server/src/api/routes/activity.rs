//! Activity log endpoints

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::ApiState;
use super::projects::types::PageQuery;
use crate::api::auth::{Auth, ProjectRead};
use crate::api::extractors::ValidatedQuery;
use crate::api::types::{
    ApiError, PaginatedResponse, datetime, default_limit, default_page, validate_limit,
    validate_page,
};
use crate::data::types::{ActivityFilter, ActivityRow};

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityDto {
    pub id: String,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub action: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityDto {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            task_id: row.task_id,
            action: row.action,
            metadata: row.metadata,
            created_at: datetime(row.created_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProjectActivityQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    /// e.g. `task_updated`
    #[validate(length(min = 1, max = 64))]
    pub action: Option<String>,

    pub task_id: Option<String>,
}

/// Mounted under `/api/v1/projects/{project_id}`
pub fn project_routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/activity", get(project_activity))
        .with_state(state)
}

pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/", get(my_activity))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/activity",
    tag = "activity",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page"),
        ("action" = Option<String>, Query, description = "Filter by action"),
        ("task_id" = Option<String>, Query, description = "Filter by task")
    ),
    responses((status = 200, description = "Project activity, newest first"))
)]
pub async fn project_activity(
    State(state): State<ApiState>,
    access: ProjectRead,
    ValidatedQuery(query): ValidatedQuery<ProjectActivityQuery>,
) -> Result<Json<PaginatedResponse<ActivityDto>>, ApiError> {
    let filter = ActivityFilter {
        action: query.action,
        task_id: query.task_id,
    };
    let (rows, total) = state
        .database
        .repository()
        .list_project_activity(&access.project_id, &filter, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(ActivityDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/activity",
    tag = "activity",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "The caller's own activity"))
)]
pub async fn my_activity(
    State(state): State<ApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Json<PaginatedResponse<ActivityDto>>, ApiError> {
    let (rows, total) = state
        .database
        .repository()
        .list_user_activity(auth.user_id(), query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(ActivityDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_project_activity_filters() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (_, outsider) = app.user("outsider@example.com").await;
        let project_id = app.project(&owner, 0).await;
        let task_id = app.task(&owner, &project_id, "Draft").await;
        let other_task = app.task(&owner, &project_id, "Other").await;
        app.put(
            &format!("/api/v1/projects/{project_id}/tasks/{task_id}"),
            &owner,
            json!({ "status": "in_progress" }),
        )
        .await;

        let base = format!("/api/v1/projects/{project_id}/activity");
        let (status, body) = app.get(&base, &owner).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total_items"], 4);
        assert_eq!(body["data"][0]["action"], "task_updated");
        assert_eq!(body["data"][0]["metadata"]["status"], "in_progress");

        let (_, body) = app.get(&format!("{base}?action=task_created"), &owner).await;
        assert_eq!(body["meta"]["total_items"], 2);

        let (_, body) = app.get(&format!("{base}?task_id={other_task}"), &owner).await;
        assert_eq!(body["meta"]["total_items"], 1);

        let (status, _) = app.get(&base, &outsider).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_my_activity() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (_, other) = app.user("other@example.com").await;
        app.project(&owner, 0).await;

        let (_, body) = app.get("/api/v1/activity", &owner).await;
        assert_eq!(body["meta"]["total_items"], 1);
        assert_eq!(body["data"][0]["action"], "project_created");

        let (_, body) = app.get("/api/v1/activity", &other).await;
        assert_eq!(body["meta"]["total_items"], 0);
    }
}
