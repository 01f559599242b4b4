//! Project API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::types::{
    datetime, default_limit, default_page, double_option, validate_date, validate_limit,
    validate_not_blank, validate_page,
};
use crate::core::constants::{CATEGORY_MAX_LEN, DESCRIPTION_MAX_LEN, NAME_MAX_LEN};
use crate::data::types::{
    BudgetEntryKind, BudgetHistoryRow, ExpenseRow, ProjectRow, ProjectStatus, ProjectWithRole,
    TeamRole,
};
use crate::domain::budget::BudgetStatus;

/// Project DTO for API responses
#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectDto {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: BudgetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for ProjectDto {
    fn from(row: ProjectRow) -> Self {
        Self {
            budget: BudgetStatus::new(row.total_budget_cents, row.actual_expenditure_cents),
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            status: row.status,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: datetime(row.created_at),
            updated_at: datetime(row.updated_at),
        }
    }
}

/// Project in the caller's project list, with the caller's role
#[derive(Debug, Serialize, ToSchema)]
pub struct MyProjectDto {
    #[serde(flatten)]
    pub project: ProjectDto,
    pub role: TeamRole,
}

impl From<ProjectWithRole> for MyProjectDto {
    fn from(row: ProjectWithRole) -> Self {
        Self {
            project: row.project.into(),
            role: row.role,
        }
    }
}

/// Request body for creating a project
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(
        length(min = 1, max = NAME_MAX_LEN, message = "Name must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(length(max = DESCRIPTION_MAX_LEN, message = "Description is too long"))]
    pub description: Option<String>,

    #[serde(default)]
    pub status: ProjectStatus,

    #[validate(custom(function = "validate_date"))]
    pub start_date: Option<String>,

    #[validate(custom(function = "validate_date"))]
    pub end_date: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0, message = "Budget must not be negative"))]
    pub total_budget_cents: i64,
}

/// Partial project update; `null` clears a nullable field
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(
        length(min = 1, max = NAME_MAX_LEN, message = "Name must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    pub status: Option<ProjectStatus>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub start_date: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub end_date: Option<Option<String>>,
}

/// Query params for listing projects
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListProjectsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    /// Optional status filter
    pub status: Option<ProjectStatus>,
}

/// Plain pagination query
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

// ============================================================================
// Budget
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetBudgetRequest {
    #[validate(range(min = 0, message = "Budget must not be negative"))]
    pub total_budget_cents: i64,

    #[validate(length(max = DESCRIPTION_MAX_LEN, message = "Note is too long"))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BudgetDto {
    pub project_id: String,
    #[serde(flatten)]
    pub status: BudgetStatus,
}

impl From<&ProjectRow> for BudgetDto {
    fn from(row: &ProjectRow) -> Self {
        Self {
            project_id: row.id.clone(),
            status: BudgetStatus::new(row.total_budget_cents, row.actual_expenditure_cents),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BudgetHistoryDto {
    pub id: String,
    pub kind: BudgetEntryKind,
    pub amount_delta_cents: i64,
    pub total_budget_cents: i64,
    pub actual_expenditure_cents: i64,
    pub note: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BudgetHistoryRow> for BudgetHistoryDto {
    fn from(row: BudgetHistoryRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            amount_delta_cents: row.amount_delta_cents,
            total_budget_cents: row.total_budget_cents,
            actual_expenditure_cents: row.actual_expenditure_cents,
            note: row.note,
            user_id: row.user_id,
            created_at: datetime(row.created_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateExpenseRequest {
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount_cents: i64,

    #[validate(
        length(min = 1, max = CATEGORY_MAX_LEN, message = "Category must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub category: String,

    #[validate(length(max = DESCRIPTION_MAX_LEN, message = "Description is too long"))]
    pub description: Option<String>,

    /// Defaults to today
    #[validate(custom(function = "validate_date"))]
    pub incurred_on: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpenseDto {
    pub id: String,
    pub amount_cents: i64,
    pub category: String,
    pub description: Option<String>,
    pub incurred_on: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ExpenseRow> for ExpenseDto {
    fn from(row: ExpenseRow) -> Self {
        Self {
            id: row.id,
            amount_cents: row.amount_cents,
            category: row.category,
            description: row.description,
            incurred_on: row.incurred_on,
            created_by: row.created_by,
            created_at: datetime(row.created_at),
        }
    }
}

/// Expense write result with the project's budget after the change
#[derive(Debug, Serialize, ToSchema)]
pub struct ExpenseChangeDto {
    pub expense: ExpenseDto,
    pub budget: BudgetDto,
}
