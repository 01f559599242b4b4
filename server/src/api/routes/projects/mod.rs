//! Project API endpoints

pub mod budget;
pub mod types;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use super::ApiState;
use crate::api::auth::{Auth, ProjectManage, ProjectOwn, ProjectRead, project_not_found};
use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::types::{ApiError, PaginatedResponse, check_date, check_date_range};
use crate::data::types::{NewActivity, NewProject, ProjectUpdate};
use crate::domain::activity::Action;

use types::{
    CreateProjectRequest, ListProjectsQuery, MyProjectDto, ProjectDto, UpdateProjectRequest,
};

/// Build Projects API routes
pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/{project_id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/{project_id}/budget", axum::routing::put(budget::set_budget))
        .route("/{project_id}/budget/history", get(budget::budget_history))
        .route(
            "/{project_id}/expenses",
            get(budget::list_expenses).post(budget::create_expense),
        )
        .route(
            "/{project_id}/expenses/{expense_id}",
            axum::routing::delete(budget::delete_expense),
        )
        .with_state(state)
}

/// List projects the caller is a member of
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    params(
        ("page" = Option<u32>, Query, description = "Page number (1-1000)"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-100)"),
        ("status" = Option<String>, Query, description = "Filter by project status")
    ),
    responses(
        (status = 200, description = "Projects with the caller's role and pagination metadata")
    )
)]
pub async fn list_projects(
    State(state): State<ApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<ListProjectsQuery>,
) -> Result<Json<PaginatedResponse<MyProjectDto>>, ApiError> {
    let (projects, total) = state
        .database
        .repository()
        .list_projects_for_user(auth.user_id(), query.status, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = projects.into_iter().map(MyProjectDto::from).collect();
    Ok(Json(PaginatedResponse::new(
        data,
        query.page,
        query.limit,
        total,
    )))
}

/// Create a project owned by the caller
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectDto),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_project(
    State(state): State<ApiState>,
    auth: Auth,
    ValidatedJson(body): ValidatedJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectDto>), ApiError> {
    check_date_range(
        body.start_date.as_deref(),
        body.end_date.as_deref(),
        "end_date",
    )?;

    let new = NewProject {
        name: body.name.trim().to_string(),
        description: body.description,
        status: body.status,
        start_date: body.start_date,
        end_date: body.end_date,
        total_budget_cents: body.total_budget_cents,
    };
    let project = state
        .database
        .repository()
        .create_project(auth.user_id(), &new)
        .await
        .map_err(ApiError::from_data)?;

    state
        .record(
            NewActivity::new(Action::ProjectCreated, auth.user_id())
                .project(&project.id)
                .metadata(json!({ "name": project.name })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(ProjectDto::from(project))))
}

/// Get a single project
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}",
    tag = "projects",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project details", body = ProjectDto),
        (status = 404, description = "Project not found or not a member")
    )
)]
pub async fn get_project(
    State(state): State<ApiState>,
    access: ProjectRead,
) -> Result<Json<ProjectDto>, ApiError> {
    let project = state.load_project(&access.project_id).await?;
    Ok(Json(ProjectDto::from(project)))
}

/// Update project details (manager+)
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}",
    tag = "projects",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = ProjectDto),
        (status = 403, description = "Insufficient role"),
        (status = 404, description = "Project not found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_project(
    State(state): State<ApiState>,
    access: ProjectManage,
    ValidatedJson(body): ValidatedJson<UpdateProjectRequest>,
) -> Result<Json<ProjectDto>, ApiError> {
    let current = state.load_project(&access.project_id).await?;

    if let Some(start) = &body.start_date {
        check_date("start_date", start.as_deref())?;
    }
    if let Some(end) = &body.end_date {
        check_date("end_date", end.as_deref())?;
    }
    // Range check against the values the row will hold after the update
    let start = match &body.start_date {
        Some(v) => v.as_deref(),
        None => current.start_date.as_deref(),
    };
    let end = match &body.end_date {
        Some(v) => v.as_deref(),
        None => current.end_date.as_deref(),
    };
    check_date_range(start, end, "end_date")?;

    let mut changed = Vec::new();
    if body.name.is_some() {
        changed.push("name");
    }
    if body.description.is_some() {
        changed.push("description");
    }
    if body.status.is_some() {
        changed.push("status");
    }
    if body.start_date.is_some() {
        changed.push("start_date");
    }
    if body.end_date.is_some() {
        changed.push("end_date");
    }

    let update = ProjectUpdate {
        name: body.name.map(|n| n.trim().to_string()),
        description: body.description,
        status: body.status,
        start_date: body.start_date,
        end_date: body.end_date,
    };
    let project = state
        .database
        .repository()
        .update_project(Some(&state.cache), &access.project_id, &update)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| project_not_found(&access.project_id))?;

    state
        .record(
            NewActivity::new(Action::ProjectUpdated, &access.user_id)
                .project(&project.id)
                .metadata(json!({ "changed": changed })),
        )
        .await;

    Ok(Json(ProjectDto::from(project)))
}

/// Delete a project with all of its tasks, budget data and attachments (owner only)
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}",
    tag = "projects",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Only the owner can delete a project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete_project(
    State(state): State<ApiState>,
    access: ProjectOwn,
) -> Result<StatusCode, ApiError> {
    let project = state.load_project(&access.project_id).await?;

    let deleted = state
        .database
        .repository()
        .delete_project(Some(&state.cache), &access.project_id)
        .await
        .map_err(ApiError::from_data)?;
    if !deleted {
        return Err(project_not_found(&access.project_id));
    }

    match state.files.delete_project(&access.project_id).await {
        Ok(removed) => tracing::debug!(project_id = %access.project_id, removed, "Project blobs removed"),
        Err(e) => tracing::warn!(
            project_id = %access.project_id,
            error = %e,
            "Failed to remove project blobs"
        ),
    }

    // The project row is gone, so the entry keeps the id in metadata only
    state
        .record(
            NewActivity::new(Action::ProjectDeleted, &access.user_id)
                .metadata(json!({ "project_id": project.id, "name": project.name })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
