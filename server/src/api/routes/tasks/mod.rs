//! Task API endpoints
//!
//! Mounted under `/api/v1/projects/{project_id}/tasks`. Every task lookup is
//! scoped to the project in the path, so a task id from another project is a
//! 404 even for members of both.

pub mod comments;
pub mod files;
pub mod types;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::ApiState;
use crate::api::auth::{ProjectManage, ProjectRead, ProjectWrite};
use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::types::{ApiError, PaginatedResponse, check_date};
use crate::data::DataError;
use crate::data::types::{NewActivity, NewTask, TaskFilter, TaskUpdate};
use crate::domain::activity::Action;

use types::{AssignRequest, CreateTaskRequest, ListTasksQuery, TaskDto, UpdateTaskRequest};

#[derive(Deserialize)]
pub struct TaskPath {
    pub task_id: String,
}

#[derive(Deserialize)]
pub struct AssigneePath {
    pub task_id: String,
    pub user_id: String,
}

/// Build task routes (without attachments, which carry their own limits)
pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/{task_id}/assignees", post(assign_user))
        .route("/{task_id}/assignees/{user_id}", delete(unassign_user))
        .route(
            "/{task_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/{task_id}/comments/{comment_id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .with_state(state)
}

fn task_not_found(task_id: &str) -> ApiError {
    ApiError::not_found("TASK_NOT_FOUND", format!("Task not found: {}", task_id))
}

/// List tasks with optional status, priority and assignee filters
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/tasks",
    tag = "tasks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("assignee_id" = Option<String>, Query, description = "Filter by assignee")
    ),
    responses((status = 200, description = "Tasks with pagination metadata"))
)]
pub async fn list_tasks(
    State(state): State<ApiState>,
    access: ProjectRead,
    ValidatedQuery(query): ValidatedQuery<ListTasksQuery>,
) -> Result<Json<PaginatedResponse<TaskDto>>, ApiError> {
    let filter = TaskFilter {
        status: query.status,
        priority: query.priority,
        assignee_id: query.assignee_id,
    };
    let (tasks, total) = state
        .database
        .repository()
        .list_tasks(&access.project_id, &filter, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = tasks.into_iter().map(TaskDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/tasks",
    tag = "tasks",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskDto),
        (status = 403, description = "Viewers cannot create tasks"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_task(
    State(state): State<ApiState>,
    access: ProjectWrite,
    ValidatedJson(body): ValidatedJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskDto>), ApiError> {
    let new = NewTask {
        title: body.title.trim().to_string(),
        description: body.description,
        status: body.status,
        priority: body.priority,
        due_date: body.due_date,
        completion_percentage: body.completion_percentage,
    };
    let task = state
        .database
        .repository()
        .create_task(&access.project_id, &access.user_id, &new)
        .await
        .map_err(ApiError::from_data)?;

    state
        .record(
            NewActivity::new(Action::TaskCreated, &access.user_id)
                .project(&access.project_id)
                .task(&task.id)
                .metadata(json!({ "title": task.title })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(TaskDto::from(task))))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}",
    tag = "tasks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task details", body = TaskDto),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<TaskPath>,
) -> Result<Json<TaskDto>, ApiError> {
    let task = state.load_task(&access.project_id, &path.task_id).await?;
    Ok(Json(TaskDto::from(task)))
}

/// Update a task. Setting status to `completed` forces completion to 100.
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}",
    tag = "tasks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID")
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskDto),
        (status = 404, description = "Task not found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_task(
    State(state): State<ApiState>,
    access: ProjectWrite,
    Path(path): Path<TaskPath>,
    ValidatedJson(body): ValidatedJson<UpdateTaskRequest>,
) -> Result<Json<TaskDto>, ApiError> {
    if let Some(due) = &body.due_date {
        check_date("due_date", due.as_deref())?;
    }

    let mut changed = serde_json::Map::new();
    if let Some(title) = &body.title {
        changed.insert("title".into(), json!(title));
    }
    if body.description.is_some() {
        changed.insert("description".into(), json!(true));
    }
    if let Some(status) = body.status {
        changed.insert("status".into(), json!(status));
    }
    if let Some(priority) = body.priority {
        changed.insert("priority".into(), json!(priority));
    }
    if let Some(due) = &body.due_date {
        changed.insert("due_date".into(), json!(due));
    }
    if let Some(completion) = body.completion_percentage {
        changed.insert("completion_percentage".into(), json!(completion));
    }

    let update = TaskUpdate {
        title: body.title.map(|t| t.trim().to_string()),
        description: body.description,
        status: body.status,
        priority: body.priority,
        due_date: body.due_date,
        completion_percentage: body.completion_percentage,
    };
    let task = state
        .database
        .repository()
        .update_task(&access.project_id, &path.task_id, &update)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| task_not_found(&path.task_id))?;

    state
        .record(
            NewActivity::new(Action::TaskUpdated, &access.user_id)
                .project(&access.project_id)
                .task(&task.id)
                .metadata(serde_json::Value::Object(changed)),
        )
        .await;

    Ok(Json(TaskDto::from(task)))
}

/// Delete a task with its comments and attachments (manager+)
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}",
    tag = "tasks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Insufficient role"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(
    State(state): State<ApiState>,
    access: ProjectManage,
    Path(path): Path<TaskPath>,
) -> Result<StatusCode, ApiError> {
    let task = state.load_task(&access.project_id, &path.task_id).await?;
    let attachments = state
        .database
        .repository()
        .list_files(&task.id)
        .await
        .map_err(ApiError::from_data)?;

    // Release blobs through the file service before the rows cascade away
    for file in &attachments {
        if let Err(e) = state.files.delete(&task.id, &file.id).await {
            tracing::warn!(task_id = %task.id, file_id = %file.id, error = %e, "Failed to remove attachment");
        }
    }

    let deleted = state
        .database
        .repository()
        .delete_task(&access.project_id, &task.id)
        .await
        .map_err(ApiError::from_data)?;
    if !deleted {
        return Err(task_not_found(&task.id));
    }

    state
        .record(
            NewActivity::new(Action::TaskDeleted, &access.user_id)
                .project(&access.project_id)
                .task(&task.id)
                .metadata(json!({ "title": task.title, "attachments": attachments.len() })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Assign a team member to a task
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/assignees",
    tag = "tasks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID")
    ),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Assignee added", body = TaskDto),
        (status = 409, description = "Already assigned"),
        (status = 422, description = "User is not a team member")
    )
)]
pub async fn assign_user(
    State(state): State<ApiState>,
    access: ProjectWrite,
    Path(path): Path<TaskPath>,
    ValidatedJson(body): ValidatedJson<AssignRequest>,
) -> Result<Json<TaskDto>, ApiError> {
    let project = state.load_project(&access.project_id).await?;
    let task = state.load_task(&access.project_id, &path.task_id).await?;
    let repo = state.database.repository();

    let member = repo
        .get_member(Some(&state.cache), &access.project_id, &body.user_id)
        .await
        .map_err(ApiError::from_data)?;
    if member.is_none() {
        return Err(ApiError::field(
            "NOT_A_MEMBER",
            "user_id",
            "Assignees must be members of the project team",
        ));
    }

    repo.assign_user(&task.id, &body.user_id, &access.user_id)
        .await
        .map_err(|e| match e {
            DataError::Conflict(message) => ApiError::conflict("ALREADY_ASSIGNED", message),
            e => ApiError::from_data(e),
        })?;

    let task = state.load_task(&access.project_id, &task.id).await?;
    let actor = state.load_user(&access.user_id).await?;
    state
        .notifier
        .task_assigned(&project, &task, &body.user_id, &actor)
        .await;
    state
        .record(
            NewActivity::new(Action::TaskAssigned, &access.user_id)
                .project(&access.project_id)
                .task(&task.id)
                .metadata(json!({ "assignee_id": body.user_id })),
        )
        .await;

    Ok(Json(TaskDto::from(task)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/assignees/{user_id}",
    tag = "tasks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID"),
        ("user_id" = String, Path, description = "Assignee user ID")
    ),
    responses(
        (status = 204, description = "Assignee removed"),
        (status = 404, description = "Task or assignment not found")
    )
)]
pub async fn unassign_user(
    State(state): State<ApiState>,
    access: ProjectWrite,
    Path(path): Path<AssigneePath>,
) -> Result<StatusCode, ApiError> {
    let task = state.load_task(&access.project_id, &path.task_id).await?;

    let removed = state
        .database
        .repository()
        .unassign_user(&task.id, &path.user_id)
        .await
        .map_err(ApiError::from_data)?;
    if !removed {
        return Err(ApiError::not_found(
            "ASSIGNMENT_NOT_FOUND",
            format!("User {} is not assigned to this task", path.user_id),
        ));
    }

    state
        .record(
            NewActivity::new(Action::TaskUnassigned, &access.user_id)
                .project(&access.project_id)
                .task(&task.id)
                .metadata(json!({ "assignee_id": path.user_id })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
