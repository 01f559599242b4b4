//! Row types returned by the transactional store
//!
//! Column-level enums are parsed on read; unknown values fall back to the
//! enum default with a warning in the repository that reads them.

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

use super::enums::{
    BudgetEntryKind, InvitationStatus, ProjectStatus, RiskLevel, RiskStatus, SubjectType,
    TaskPriority, TaskStatus, TeamRole,
};

// ============================================================================
// User types
// ============================================================================

/// User row from database (never carries the password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Stored credentials for password login
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: UserRow,
    pub password_hash: String,
}

// ============================================================================
// Project types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub total_budget_cents: i64,
    pub actual_expenditure_cents: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Project with the caller's role (for list_for_user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWithRole {
    pub project: ProjectRow,
    pub role: TeamRole,
}

/// Fields for a new project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub total_budget_cents: i64,
}

/// Partial project update. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<Option<String>>,
    pub end_date: Option<Option<String>>,
}

// ============================================================================
// Team types
// ============================================================================

/// Membership row (cached for authorization)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRow {
    pub project_id: String,
    pub user_id: String,
    pub role: TeamRole,
    pub joined_at: i64,
}

/// Member with user info (for list_members)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberWithUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: TeamRole,
    pub joined_at: i64,
}

/// Result type for team operations that may not touch the project owner
#[derive(Debug, Clone)]
pub enum OwnerProtectedResult<T> {
    Success(T),
    Owner,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationRow {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub inviter_id: String,
    pub email: String,
    pub role: TeamRole,
    pub status: InvitationStatus,
    pub message: Option<String>,
    pub created_at: i64,
    pub responded_at: Option<i64>,
}

/// Outcome of accepting or declining an invitation
#[derive(Debug, Clone)]
pub enum InvitationResponse {
    Responded(InvitationRow),
    NotFound,
    NotRecipient,
    NotPending(InvitationStatus),
}

// ============================================================================
// Task types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
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
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub completion_percentage: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<String>>,
    pub completion_percentage: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<String>,
}

/// Open task with a due date inside a sweep window
#[derive(Debug, Clone)]
pub struct TaskDueRow {
    pub task_id: String,
    pub title: String,
    pub due_date: String,
    pub project_id: String,
    pub project_name: String,
    pub project_owner_id: String,
    pub assignee_ids: Vec<String>,
}

/// Aggregate task counts for reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: i64,
    pub todo: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub overdue: i64,
    pub average_completion: f64,
}

// ============================================================================
// Risk types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRow {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: RiskLevel,
    pub probability: RiskLevel,
    pub status: RiskStatus,
    pub mitigation_plan: Option<String>,
    pub owner_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewRisk {
    pub title: String,
    pub description: Option<String>,
    pub severity: RiskLevel,
    pub probability: RiskLevel,
    pub status: RiskStatus,
    pub mitigation_plan: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub severity: Option<RiskLevel>,
    pub probability: Option<RiskLevel>,
    pub status: Option<RiskStatus>,
    pub mitigation_plan: Option<Option<String>>,
    pub owner_id: Option<Option<String>>,
}

// ============================================================================
// Budget types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseRow {
    pub id: String,
    pub project_id: String,
    pub amount_cents: i64,
    pub category: String,
    pub description: Option<String>,
    pub incurred_on: String,
    pub created_by: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount_cents: i64,
    pub category: String,
    pub description: Option<String>,
    pub incurred_on: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetHistoryRow {
    pub id: String,
    pub project_id: String,
    pub kind: BudgetEntryKind,
    pub amount_delta_cents: i64,
    pub total_budget_cents: i64,
    pub actual_expenditure_cents: i64,
    pub note: Option<String>,
    pub user_id: Option<String>,
    pub created_at: i64,
}

/// Outcome of a write guarded by the budget invariant
#[derive(Debug, Clone)]
pub enum BudgetWriteResult<T> {
    Success(T),
    Rejected(DomainError),
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_cents: i64,
    pub count: i64,
}

// ============================================================================
// Comment & file types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Attachment metadata; bytes live in file storage under `content_hash`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFileRow {
    pub id: String,
    pub task_id: String,
    pub project_id: String,
    pub uploader_id: Option<String>,
    pub original_name: String,
    pub content_hash: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewTaskFile {
    pub original_name: String,
    pub content_hash: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

// ============================================================================
// Notification & activity types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub payload: serde_json::Value,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: String,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub action: String,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub action: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub action: Option<String>,
    pub task_id: Option<String>,
}
