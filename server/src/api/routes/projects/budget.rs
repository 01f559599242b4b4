//! Budget and expense endpoints
//!
//! Every write goes through a single repository transaction that re-reads the
//! project totals, so `actual_expenditure <= total_budget` holds even under
//! concurrent requests.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::types::{
    BudgetDto, BudgetHistoryDto, CreateExpenseRequest, ExpenseChangeDto, ExpenseDto, PageQuery,
    SetBudgetRequest,
};
use crate::api::auth::{ProjectManage, ProjectRead, ProjectWrite, project_not_found};
use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::routes::ApiState;
use crate::api::types::{ApiError, PaginatedResponse};
use crate::data::types::{BudgetWriteResult, NewActivity, NewExpense};
use crate::domain::activity::Action;
use crate::utils::time::{format_date, today};

#[derive(Deserialize)]
pub struct ExpensePath {
    pub expense_id: String,
}

/// Change the total budget (manager+)
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/budget",
    tag = "budget",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = SetBudgetRequest,
    responses(
        (status = 200, description = "Budget updated", body = BudgetDto),
        (status = 403, description = "Insufficient role"),
        (status = 422, description = "Budget below actual expenditure")
    )
)]
pub async fn set_budget(
    State(state): State<ApiState>,
    access: ProjectManage,
    ValidatedJson(body): ValidatedJson<SetBudgetRequest>,
) -> Result<Json<BudgetDto>, ApiError> {
    let result = state
        .database
        .repository()
        .set_total_budget(
            Some(&state.cache),
            &access.project_id,
            &access.user_id,
            body.total_budget_cents,
            body.note.as_deref(),
        )
        .await
        .map_err(ApiError::from_data)?;

    let project = match result {
        BudgetWriteResult::Success(project) => project,
        BudgetWriteResult::Rejected(e) => return Err(ApiError::from_domain(e)),
        BudgetWriteResult::NotFound => return Err(project_not_found(&access.project_id)),
    };

    state
        .record(
            NewActivity::new(Action::BudgetChanged, &access.user_id)
                .project(&project.id)
                .metadata(json!({ "total_budget_cents": project.total_budget_cents })),
        )
        .await;

    Ok(Json(BudgetDto::from(&project)))
}

/// Budget change history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/budget/history",
    tag = "budget",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "Budget history entries"))
)]
pub async fn budget_history(
    State(state): State<ApiState>,
    access: ProjectRead,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Json<PaginatedResponse<BudgetHistoryDto>>, ApiError> {
    let (rows, total) = state
        .database
        .repository()
        .list_budget_history(&access.project_id, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(BudgetHistoryDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/expenses",
    tag = "budget",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "Expenses, newest first"))
)]
pub async fn list_expenses(
    State(state): State<ApiState>,
    access: ProjectRead,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Json<PaginatedResponse<ExpenseDto>>, ApiError> {
    let (rows, total) = state
        .database
        .repository()
        .list_expenses(&access.project_id, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(ExpenseDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

/// Record an expense against the project budget (member+)
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/expenses",
    tag = "budget",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense recorded", body = ExpenseChangeDto),
        (status = 422, description = "Expense exceeds the remaining budget")
    )
)]
pub async fn create_expense(
    State(state): State<ApiState>,
    access: ProjectWrite,
    ValidatedJson(body): ValidatedJson<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<ExpenseChangeDto>), ApiError> {
    let expense = NewExpense {
        amount_cents: body.amount_cents,
        category: body.category.trim().to_string(),
        description: body.description,
        incurred_on: body.incurred_on.unwrap_or_else(|| format_date(today())),
    };

    let result = state
        .database
        .repository()
        .add_expense(Some(&state.cache), &access.project_id, &access.user_id, &expense)
        .await
        .map_err(ApiError::from_data)?;

    let (expense, project) = match result {
        BudgetWriteResult::Success(written) => written,
        BudgetWriteResult::Rejected(e) => return Err(ApiError::from_domain(e)),
        BudgetWriteResult::NotFound => return Err(project_not_found(&access.project_id)),
    };

    state
        .record(
            NewActivity::new(Action::ExpenseAdded, &access.user_id)
                .project(&project.id)
                .metadata(json!({
                    "expense_id": expense.id,
                    "amount_cents": expense.amount_cents,
                    "category": expense.category,
                })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ExpenseChangeDto {
            budget: BudgetDto::from(&project),
            expense: expense.into(),
        }),
    ))
}

/// Remove an expense and reverse its amount (manager+)
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/expenses/{expense_id}",
    tag = "budget",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("expense_id" = String, Path, description = "Expense ID")
    ),
    responses(
        (status = 200, description = "Expense removed", body = ExpenseChangeDto),
        (status = 404, description = "Expense not found")
    )
)]
pub async fn delete_expense(
    State(state): State<ApiState>,
    access: ProjectManage,
    Path(path): Path<ExpensePath>,
) -> Result<Json<ExpenseChangeDto>, ApiError> {
    let (expense, project) = state
        .database
        .repository()
        .delete_expense(
            Some(&state.cache),
            &access.project_id,
            &path.expense_id,
            &access.user_id,
        )
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| {
            ApiError::not_found(
                "EXPENSE_NOT_FOUND",
                format!("Expense not found: {}", path.expense_id),
            )
        })?;

    state
        .record(
            NewActivity::new(Action::ExpenseRemoved, &access.user_id)
                .project(&project.id)
                .metadata(json!({
                    "expense_id": expense.id,
                    "amount_cents": expense.amount_cents,
                })),
        )
        .await;

    Ok(Json(ExpenseChangeDto {
        budget: BudgetDto::from(&project),
        expense: expense.into(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;
    use crate::data::types::TeamRole;

    #[tokio::test]
    async fn test_expense_respects_budget() {
        let app = TestApp::new().await;
        let (_, token) = app.user("owner@example.com").await;
        let project_id = app.project(&token, 10_000).await;
        let uri = format!("/api/v1/projects/{project_id}/expenses");

        let (status, body) = app
            .post(
                &uri,
                &token,
                json!({ "amount_cents": 6_000, "category": "travel", "incurred_on": "2026-03-01" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["budget"]["actual_expenditure_cents"], 6_000);
        assert_eq!(body["budget"]["remaining_cents"], 4_000);

        let (status, body) = app
            .post(&uri, &token, json!({ "amount_cents": 4_001, "category": "travel" }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUDGET_EXCEEDED");
        assert!(body["fields"]["amount_cents"].is_array());

        // Rejected write left the totals unchanged
        let (_, body) = app.get(&format!("/api/v1/projects/{project_id}"), &token).await;
        assert_eq!(body["budget"]["actual_expenditure_cents"], 6_000);

        let (_, body) = app.get(&uri, &token).await;
        assert_eq!(body["meta"]["total_items"], 1);
    }

    #[tokio::test]
    async fn test_expense_validation() {
        let app = TestApp::new().await;
        let (_, token) = app.user("owner@example.com").await;
        let project_id = app.project(&token, 10_000).await;

        let (status, body) = app
            .post(
                &format!("/api/v1/projects/{project_id}/expenses"),
                &token,
                json!({ "amount_cents": 0, "category": "", "incurred_on": "yesterday" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        for field in ["amount_cents", "category", "incurred_on"] {
            assert!(body["fields"][field].is_array(), "{field}: {body}");
        }
    }

    #[tokio::test]
    async fn test_budget_change_and_history() {
        let app = TestApp::new().await;
        let (_, token) = app.user("owner@example.com").await;
        let project_id = app.project(&token, 10_000).await;

        app.post(
            &format!("/api/v1/projects/{project_id}/expenses"),
            &token,
            json!({ "amount_cents": 5_000, "category": "hardware" }),
        )
        .await;

        let budget_uri = format!("/api/v1/projects/{project_id}/budget");
        let (status, body) = app
            .put(&budget_uri, &token, json!({ "total_budget_cents": 4_999 }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUDGET_BELOW_EXPENDITURE");
        assert!(body["fields"]["total_budget_cents"].is_array());

        let (status, body) = app
            .put(
                &budget_uri,
                &token,
                json!({ "total_budget_cents": 20_000, "note": "Phase 2" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_budget_cents"], 20_000);
        assert_eq!(body["remaining_cents"], 15_000);

        let (_, body) = app
            .get(&format!("/api/v1/projects/{project_id}/budget/history"), &token)
            .await;
        let kinds: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["kind"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"expense_added"));
        assert!(kinds.contains(&"budget_set"));
    }

    #[tokio::test]
    async fn test_delete_expense_reverses_amount() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (member, member_token) = app.user("member@example.com").await;
        let project_id = app.project(&owner, 10_000).await;
        app.join(&project_id, &member.id, TeamRole::Member).await;

        let (status, body) = app
            .post(
                &format!("/api/v1/projects/{project_id}/expenses"),
                &member_token,
                json!({ "amount_cents": 2_500, "category": "travel" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let expense_id = body["expense"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/projects/{project_id}/expenses/{expense_id}");

        let (status, _) = app.delete(&uri, &member_token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.delete(&uri, &owner).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["budget"]["actual_expenditure_cents"], 0);

        let (status, body) = app.delete(&uri, &owner).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "EXPENSE_NOT_FOUND");
    }
}
