//! Activity log entries for mutating operations

use crate::data::TransactionalService;
use crate::data::types::NewActivity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    UserRegistered,
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    BudgetChanged,
    ExpenseAdded,
    ExpenseRemoved,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskAssigned,
    TaskUnassigned,
    CommentAdded,
    CommentUpdated,
    CommentDeleted,
    FileUploaded,
    FileDeleted,
    RiskCreated,
    RiskUpdated,
    RiskDeleted,
    MemberRoleChanged,
    MemberRemoved,
    InvitationSent,
    InvitationRevoked,
    InvitationAccepted,
    InvitationDeclined,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRegistered => "user_registered",
            Self::ProjectCreated => "project_created",
            Self::ProjectUpdated => "project_updated",
            Self::ProjectDeleted => "project_deleted",
            Self::BudgetChanged => "budget_changed",
            Self::ExpenseAdded => "expense_added",
            Self::ExpenseRemoved => "expense_removed",
            Self::TaskCreated => "task_created",
            Self::TaskUpdated => "task_updated",
            Self::TaskDeleted => "task_deleted",
            Self::TaskAssigned => "task_assigned",
            Self::TaskUnassigned => "task_unassigned",
            Self::CommentAdded => "comment_added",
            Self::CommentUpdated => "comment_updated",
            Self::CommentDeleted => "comment_deleted",
            Self::FileUploaded => "file_uploaded",
            Self::FileDeleted => "file_deleted",
            Self::RiskCreated => "risk_created",
            Self::RiskUpdated => "risk_updated",
            Self::RiskDeleted => "risk_deleted",
            Self::MemberRoleChanged => "member_role_changed",
            Self::MemberRemoved => "member_removed",
            Self::InvitationSent => "invitation_sent",
            Self::InvitationRevoked => "invitation_revoked",
            Self::InvitationAccepted => "invitation_accepted",
            Self::InvitationDeclined => "invitation_declined",
        }
    }
}

impl NewActivity {
    pub fn new(action: Action, user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            project_id: None,
            task_id: None,
            action: action.as_str().to_string(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Write an activity entry; failures are logged and swallowed
pub async fn record(database: &TransactionalService, entry: NewActivity) {
    if let Err(e) = database.repository().log_activity(&entry).await {
        tracing::warn!(action = %entry.action, error = %e, "Failed to record activity");
    }
}
