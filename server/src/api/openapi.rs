//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{
    activity, auth, health, invitations, notifications, projects, reports, risks, tasks, team,
};
use crate::api::types::PaginationMeta;
use crate::data::types::{
    BudgetEntryKind, InvitationStatus, ProjectStatus, RiskLevel, RiskStatus, SubjectType,
    TaskPriority, TaskStatus, TeamRole,
};
use crate::domain::NotificationPayload;
use crate::domain::budget::BudgetStatus;
use crate::domain::risk::{RatingCounts, RiskRating, RiskSummary, RiskTrend};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ProjectHub API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Projects, tasks, budgets, risks and team collaboration"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "auth", description = "Registration, login and the current user"),
        (name = "projects", description = "Project management"),
        (name = "budget", description = "Budgets, expenses and budget history"),
        (name = "tasks", description = "Tasks and assignments"),
        (name = "comments", description = "Task comments"),
        (name = "files", description = "Task attachments"),
        (name = "risks", description = "Risk register"),
        (name = "team", description = "Team members and project invitations"),
        (name = "invitations", description = "Invitations addressed to the current user"),
        (name = "notifications", description = "Notification inbox"),
        (name = "activity", description = "Activity log"),
        (name = "reports", description = "Project reports")
    ),
    paths(
        health::health,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Projects
        projects::list_projects,
        projects::create_project,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        // Budget
        projects::budget::set_budget,
        projects::budget::budget_history,
        projects::budget::list_expenses,
        projects::budget::create_expense,
        projects::budget::delete_expense,
        // Tasks
        tasks::list_tasks,
        tasks::create_task,
        tasks::get_task,
        tasks::update_task,
        tasks::delete_task,
        tasks::assign_user,
        tasks::unassign_user,
        tasks::comments::list_comments,
        tasks::comments::create_comment,
        tasks::comments::update_comment,
        tasks::comments::delete_comment,
        tasks::files::list_files,
        tasks::files::upload_file,
        tasks::files::download_file,
        tasks::files::delete_file,
        // Risks
        risks::list_risks,
        risks::create_risk,
        risks::risk_summary,
        risks::get_risk,
        risks::update_risk,
        risks::delete_risk,
        // Team
        team::list_members,
        team::update_member,
        team::remove_member,
        team::list_invitations,
        team::create_invitation,
        team::revoke_invitation,
        invitations::list_my_invitations,
        invitations::accept_invitation,
        invitations::decline_invitation,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        notifications::cleanup,
        // Activity & reports
        activity::project_activity,
        activity::my_activity,
        reports::summary_report,
        reports::budget_report,
    ),
    components(schemas(
        PaginationMeta,
        health::HealthResponse,
        // Enums
        ProjectStatus,
        TaskStatus,
        TaskPriority,
        TeamRole,
        InvitationStatus,
        RiskLevel,
        RiskStatus,
        BudgetEntryKind,
        SubjectType,
        // Auth
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::UserDto,
        auth::SessionResponse,
        // Projects & budget
        projects::types::ProjectDto,
        projects::types::MyProjectDto,
        projects::types::CreateProjectRequest,
        projects::types::UpdateProjectRequest,
        projects::types::SetBudgetRequest,
        projects::types::BudgetDto,
        projects::types::BudgetHistoryDto,
        projects::types::CreateExpenseRequest,
        projects::types::ExpenseDto,
        projects::types::ExpenseChangeDto,
        BudgetStatus,
        // Tasks
        tasks::types::TaskDto,
        tasks::types::CreateTaskRequest,
        tasks::types::UpdateTaskRequest,
        tasks::types::AssignRequest,
        tasks::types::CommentDto,
        tasks::types::CommentRequest,
        tasks::types::TaskFileDto,
        // Risks
        risks::types::RiskDto,
        risks::types::CreateRiskRequest,
        risks::types::UpdateRiskRequest,
        RiskRating,
        RiskTrend,
        RatingCounts,
        RiskSummary,
        // Team
        team::types::MemberDto,
        team::types::UpdateMemberRequest,
        team::types::InviteRequest,
        team::types::InvitationDto,
        // Notifications
        notifications::NotificationDto,
        notifications::UnreadCount,
        notifications::UpdatedCount,
        notifications::DeletedCount,
        NotificationPayload,
        // Activity & reports
        activity::ActivityDto,
        reports::TaskReport,
        reports::SummaryReport,
        reports::CategoryBreakdown,
        reports::BudgetReport,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ProjectHub API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/api/v1/auth/register",
            "/api/v1/projects/{project_id}/expenses",
            "/api/v1/projects/{project_id}/risks/summary",
            "/api/v1/projects/{project_id}/tasks/{task_id}/files",
            "/api/v1/notifications/cleanup",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(doc["components"]["schemas"]["RiskDto"].is_object());
    }
}
