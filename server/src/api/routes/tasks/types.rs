//! Task API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::types::{
    datetime, default_limit, default_page, double_option, validate_date, validate_limit,
    validate_not_blank, validate_page,
};
use crate::core::constants::{COMMENT_MAX_LEN, DESCRIPTION_MAX_LEN, NAME_MAX_LEN};
use crate::data::types::{CommentRow, TaskFileRow, TaskPriority, TaskRow, TaskStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskDto {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub completion_percentage: i64,
    pub created_by: Option<String>,
    pub assignee_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRow> for TaskDto {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            status: row.status,
            priority: row.priority,
            due_date: row.due_date,
            completion_percentage: row.completion_percentage,
            created_by: row.created_by,
            assignee_ids: row.assignee_ids,
            created_at: datetime(row.created_at),
            updated_at: datetime(row.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTaskRequest {
    #[validate(
        length(min = 1, max = NAME_MAX_LEN, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,

    #[validate(length(max = DESCRIPTION_MAX_LEN, message = "Description is too long"))]
    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    #[validate(custom(function = "validate_date"))]
    pub due_date: Option<String>,

    /// Forced to 100 when the status is `completed`
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "Completion must be between 0 and 100"))]
    pub completion_percentage: i64,
}

/// Partial task update; `null` clears a nullable field
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTaskRequest {
    #[validate(
        length(min = 1, max = NAME_MAX_LEN, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,

    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub due_date: Option<Option<String>>,

    #[validate(range(min = 0, max = 100, message = "Completion must be between 0 and 100"))]
    pub completion_percentage: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListTasksQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRequest {
    #[validate(length(min = 1, max = 64, message = "User ID is required"))]
    pub user_id: String,
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentDto {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentRow> for CommentDto {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            task_id: row.task_id,
            user_id: row.user_id,
            author_name: row.author_name,
            body: row.body,
            created_at: datetime(row.created_at),
            updated_at: datetime(row.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    #[validate(
        length(min = 1, max = COMMENT_MAX_LEN, message = "Comment must be 1-10000 characters"),
        custom(function = "validate_not_blank")
    )]
    pub body: String,
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskFileDto {
    pub id: String,
    pub task_id: String,
    pub uploader_id: Option<String>,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    /// SHA-256 of the content
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<TaskFileRow> for TaskFileDto {
    fn from(row: TaskFileRow) -> Self {
        Self {
            id: row.id,
            task_id: row.task_id,
            uploader_id: row.uploader_id,
            original_name: row.original_name,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            content_hash: row.content_hash,
            created_at: datetime(row.created_at),
        }
    }
}
