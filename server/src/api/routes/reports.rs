//! Project reports
//!
//! Both reports are computed on read from the current project state.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::ApiState;
use crate::api::auth::ProjectRead;
use crate::api::types::ApiError;
use crate::data::types::{CategoryTotal, ProjectStatus, TaskStats};
use crate::domain::budget::BudgetStatus;
use crate::domain::risk::RiskSummary;
use crate::utils::time::{format_date, today};

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskReport {
    pub total: i64,
    pub todo: i64,
    pub in_progress: i64,
    pub completed: i64,
    /// Open tasks whose due date has passed
    pub overdue: i64,
    pub average_completion: f64,
}

impl From<TaskStats> for TaskReport {
    fn from(stats: TaskStats) -> Self {
        Self {
            total: stats.total,
            todo: stats.todo,
            in_progress: stats.in_progress,
            completed: stats.completed,
            overdue: stats.overdue,
            average_completion: stats.average_completion,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryReport {
    pub project_id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub generated_on: String,
    pub tasks: TaskReport,
    pub budget: BudgetStatus,
    pub risks: RiskSummary,
    pub member_count: usize,
    /// Attachment bytes after deduplication
    pub storage_bytes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryBreakdown {
    pub category: String,
    pub total_cents: i64,
    pub count: i64,
    /// Share of actual expenditure
    pub percent: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BudgetReport {
    pub project_id: String,
    #[serde(flatten)]
    pub status: BudgetStatus,
    pub by_category: Vec<CategoryBreakdown>,
}

fn breakdown(totals: Vec<CategoryTotal>, actual_cents: i64) -> Vec<CategoryBreakdown> {
    totals
        .into_iter()
        .map(|t| CategoryBreakdown {
            percent: if actual_cents > 0 {
                t.total_cents as f64 / actual_cents as f64 * 100.0
            } else {
                0.0
            },
            category: t.category,
            total_cents: t.total_cents,
            count: t.count,
        })
        .collect()
}

/// Mounted under `/api/v1/projects/{project_id}`
pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/reports/summary", get(summary_report))
        .route("/reports/budget", get(budget_report))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/reports/summary",
    tag = "reports",
    params(("project_id" = String, Path, description = "Project ID")),
    responses((status = 200, description = "Task, budget, risk and team overview", body = SummaryReport))
)]
pub async fn summary_report(
    State(state): State<ApiState>,
    access: ProjectRead,
) -> Result<Json<SummaryReport>, ApiError> {
    let project = state.load_project(&access.project_id).await?;
    let repo = state.database.repository();
    let today = format_date(today());

    let stats = repo
        .task_stats(&project.id, &today)
        .await
        .map_err(ApiError::from_data)?;
    let risks = repo
        .list_all_risks(&project.id)
        .await
        .map_err(ApiError::from_data)?;
    let members = repo
        .list_member_ids(&project.id)
        .await
        .map_err(ApiError::from_data)?;
    let storage_bytes = repo
        .storage_bytes(&project.id)
        .await
        .map_err(ApiError::from_data)?;

    Ok(Json(SummaryReport {
        budget: BudgetStatus::new(project.total_budget_cents, project.actual_expenditure_cents),
        project_id: project.id,
        name: project.name,
        status: project.status,
        generated_on: today,
        tasks: TaskReport::from(stats),
        risks: RiskSummary::from_risks(&risks),
        member_count: members.len(),
        storage_bytes,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/reports/budget",
    tag = "reports",
    params(("project_id" = String, Path, description = "Project ID")),
    responses((status = 200, description = "Budget totals with per-category spending", body = BudgetReport))
)]
pub async fn budget_report(
    State(state): State<ApiState>,
    access: ProjectRead,
) -> Result<Json<BudgetReport>, ApiError> {
    let project = state.load_project(&access.project_id).await?;
    let totals = state
        .database
        .repository()
        .expense_totals_by_category(&project.id)
        .await
        .map_err(ApiError::from_data)?;

    Ok(Json(BudgetReport {
        by_category: breakdown(totals, project.actual_expenditure_cents),
        status: BudgetStatus::new(project.total_budget_cents, project.actual_expenditure_cents),
        project_id: project.id,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::api::routes::test_support::TestApp;
    use crate::data::types::TeamRole;

    #[test]
    fn test_breakdown_percentages() {
        let totals = vec![
            CategoryTotal { category: "travel".into(), total_cents: 750, count: 2 },
            CategoryTotal { category: "tools".into(), total_cents: 250, count: 1 },
        ];
        let rows = breakdown(totals, 1000);
        assert_eq!(rows[0].percent, 75.0);
        assert_eq!(rows[1].percent, 25.0);

        assert!(breakdown(Vec::new(), 0).is_empty());
    }

    #[tokio::test]
    async fn test_summary_report() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (member, _) = app.user("member@example.com").await;
        let project_id = app.project(&owner, 10_000).await;
        app.join(&project_id, &member.id, TeamRole::Member).await;

        let task_id = app.task(&owner, &project_id, "Plan").await;
        app.task(&owner, &project_id, "Build").await;
        app.put(
            &format!("/api/v1/projects/{project_id}/tasks/{task_id}"),
            &owner,
            json!({ "status": "completed" }),
        )
        .await;
        app.post(
            &format!("/api/v1/projects/{project_id}/risks"),
            &owner,
            json!({ "title": "Churn", "severity": "high", "probability": "high" }),
        )
        .await;
        app.post(
            &format!("/api/v1/projects/{project_id}/expenses"),
            &owner,
            json!({ "amount_cents": 2_500, "category": "travel" }),
        )
        .await;

        let (status, body) = app
            .get(&format!("/api/v1/projects/{project_id}/reports/summary"), &owner)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["tasks"]["total"], 2);
        assert_eq!(body["tasks"]["completed"], 1);
        assert_eq!(body["budget"]["remaining_cents"], 7_500);
        assert_eq!(body["risks"]["by_rating"]["critical"], 1);
        assert_eq!(body["risks"]["trend"], "increasing");
        assert_eq!(body["member_count"], 2);
        assert_eq!(body["storage_bytes"], 0);
    }

    #[tokio::test]
    async fn test_budget_report() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let project_id = app.project(&owner, 10_000).await;
        let expenses = format!("/api/v1/projects/{project_id}/expenses");
        for (amount, category) in [(3_000, "travel"), (1_000, "travel"), (1_000, "tools")] {
            let (status, _) = app
                .post(&expenses, &owner, json!({ "amount_cents": amount, "category": category }))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = app
            .get(&format!("/api/v1/projects/{project_id}/reports/budget"), &owner)
            .await;
        assert_eq!(body["actual_expenditure_cents"], 5_000);
        assert_eq!(body["remaining_percent"], 50.0);
        assert_eq!(body["by_category"][0]["category"], "travel");
        assert_eq!(body["by_category"][0]["total_cents"], 4_000);
        assert_eq!(body["by_category"][0]["count"], 2);
        assert_eq!(body["by_category"][0]["percent"], 80.0);
    }
}
