//! Repository trait at the seam between the API and storage
//!
//! Handlers only see `TransactionalRepository`; the SQLite implementation in
//! `sqlite::repository_impl` delegates to the repository free functions.

use async_trait::async_trait;

use crate::data::cache::CacheService;
use crate::data::error::DataError;
use crate::data::types::{
    ActivityFilter, ActivityRow, BudgetHistoryRow, BudgetWriteResult, CategoryTotal, CommentRow,
    ExpenseRow, InvitationResponse, InvitationRow, InvitationStatus, MemberRow, MemberWithUser,
    NewActivity, NewExpense, NewNotification, NewProject, NewRisk, NewTask, NewTaskFile,
    NotificationRow, OwnerProtectedResult, ProjectRow, ProjectStatus, ProjectUpdate,
    ProjectWithRole, RiskRow, RiskStatus, RiskUpdate, TaskDueRow, TaskFileRow, TaskFilter,
    TaskRow, TaskStats, TaskUpdate, TeamRole, UserCredentials, UserRow,
};

#[async_trait]
pub trait TransactionalRepository: Send + Sync {
    // ==================== User Operations ====================

    /// Create a user; a taken email is `DataError::Conflict`
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<UserRow, DataError>;

    async fn get_user(
        &self,
        cache: Option<&CacheService>,
        id: &str,
    ) -> Result<Option<UserRow>, DataError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, DataError>;

    async fn get_credentials(&self, email: &str) -> Result<Option<UserCredentials>, DataError>;

    // ==================== Project Operations ====================

    /// Create a project with its owner membership and initial budget entry
    async fn create_project(
        &self,
        owner_id: &str,
        project: &NewProject,
    ) -> Result<ProjectRow, DataError>;

    async fn get_project(
        &self,
        cache: Option<&CacheService>,
        id: &str,
    ) -> Result<Option<ProjectRow>, DataError>;

    async fn list_projects_for_user(
        &self,
        user_id: &str,
        status: Option<ProjectStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ProjectWithRole>, u64), DataError>;

    async fn update_project(
        &self,
        cache: Option<&CacheService>,
        id: &str,
        update: &ProjectUpdate,
    ) -> Result<Option<ProjectRow>, DataError>;

    async fn delete_project(&self, cache: Option<&CacheService>, id: &str)
    -> Result<bool, DataError>;

    async fn list_projects_ending_between(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<ProjectRow>, DataError>;

    async fn list_projects_with_budget(&self) -> Result<Vec<ProjectRow>, DataError>;

    // ==================== Budget Operations ====================

    async fn set_total_budget(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
        new_total_cents: i64,
        note: Option<&str>,
    ) -> Result<BudgetWriteResult<ProjectRow>, DataError>;

    /// Insert an expense and raise actual expenditure atomically
    async fn add_expense(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
        expense: &NewExpense,
    ) -> Result<BudgetWriteResult<(ExpenseRow, ProjectRow)>, DataError>;

    /// Delete an expense and reverse its amount atomically
    async fn delete_expense(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        expense_id: &str,
        user_id: &str,
    ) -> Result<Option<(ExpenseRow, ProjectRow)>, DataError>;

    async fn list_expenses(
        &self,
        project_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ExpenseRow>, u64), DataError>;

    async fn list_budget_history(
        &self,
        project_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<BudgetHistoryRow>, u64), DataError>;

    async fn expense_totals_by_category(
        &self,
        project_id: &str,
    ) -> Result<Vec<CategoryTotal>, DataError>;

    // ==================== Team Operations ====================

    async fn get_member(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRow>, DataError>;

    async fn list_members(
        &self,
        project_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<MemberWithUser>, u64), DataError>;

    async fn list_member_ids(&self, project_id: &str) -> Result<Vec<String>, DataError>;

    async fn update_member_role(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
        role: TeamRole,
    ) -> Result<OwnerProtectedResult<MemberRow>, DataError>;

    async fn remove_member(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
    ) -> Result<OwnerProtectedResult<()>, DataError>;

    // ==================== Invitation Operations ====================

    async fn create_invitation(
        &self,
        project_id: &str,
        inviter_id: &str,
        email: &str,
        role: TeamRole,
        message: Option<&str>,
    ) -> Result<InvitationRow, DataError>;

    async fn list_project_invitations(
        &self,
        project_id: &str,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationRow>, DataError>;

    async fn list_pending_invitations(&self, email: &str)
    -> Result<Vec<InvitationRow>, DataError>;

    async fn delete_invitation(&self, project_id: &str, id: &str) -> Result<bool, DataError>;

    async fn respond_to_invitation(
        &self,
        cache: Option<&CacheService>,
        id: &str,
        user_id: &str,
        user_email: &str,
        accept: bool,
    ) -> Result<InvitationResponse, DataError>;

    // ==================== Task Operations ====================

    async fn create_task(
        &self,
        project_id: &str,
        created_by: &str,
        task: &NewTask,
    ) -> Result<TaskRow, DataError>;

    async fn get_task(&self, project_id: &str, task_id: &str)
    -> Result<Option<TaskRow>, DataError>;

    async fn list_tasks(
        &self,
        project_id: &str,
        filter: &TaskFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<TaskRow>, u64), DataError>;

    async fn update_task(
        &self,
        project_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> Result<Option<TaskRow>, DataError>;

    async fn delete_task(&self, project_id: &str, task_id: &str) -> Result<bool, DataError>;

    async fn assign_user(
        &self,
        task_id: &str,
        user_id: &str,
        assigned_by: &str,
    ) -> Result<(), DataError>;

    async fn unassign_user(&self, task_id: &str, user_id: &str) -> Result<bool, DataError>;

    async fn list_tasks_due_between(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<TaskDueRow>, DataError>;

    async fn task_stats(&self, project_id: &str, today: &str) -> Result<TaskStats, DataError>;

    // ==================== Risk Operations ====================

    async fn create_risk(
        &self,
        project_id: &str,
        created_by: &str,
        risk: &NewRisk,
    ) -> Result<RiskRow, DataError>;

    async fn get_risk(&self, project_id: &str, risk_id: &str)
    -> Result<Option<RiskRow>, DataError>;

    async fn list_risks(
        &self,
        project_id: &str,
        status: Option<RiskStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RiskRow>, u64), DataError>;

    async fn list_all_risks(&self, project_id: &str) -> Result<Vec<RiskRow>, DataError>;

    async fn update_risk(
        &self,
        project_id: &str,
        risk_id: &str,
        update: &RiskUpdate,
    ) -> Result<Option<RiskRow>, DataError>;

    async fn delete_risk(&self, project_id: &str, risk_id: &str) -> Result<bool, DataError>;

    // ==================== Comment Operations ====================

    async fn create_comment(
        &self,
        task_id: &str,
        user_id: &str,
        body: &str,
    ) -> Result<CommentRow, DataError>;

    async fn get_comment(
        &self,
        task_id: &str,
        comment_id: &str,
    ) -> Result<Option<CommentRow>, DataError>;

    async fn list_comments(
        &self,
        task_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<CommentRow>, u64), DataError>;

    async fn update_comment(
        &self,
        task_id: &str,
        comment_id: &str,
        body: &str,
    ) -> Result<Option<CommentRow>, DataError>;

    async fn delete_comment(&self, task_id: &str, comment_id: &str) -> Result<bool, DataError>;

    // ==================== File Operations ====================

    async fn create_file(
        &self,
        project_id: &str,
        task_id: &str,
        uploader_id: &str,
        file: &NewTaskFile,
    ) -> Result<TaskFileRow, DataError>;

    async fn get_file(
        &self,
        task_id: &str,
        file_id: &str,
    ) -> Result<Option<TaskFileRow>, DataError>;

    async fn list_files(&self, task_id: &str) -> Result<Vec<TaskFileRow>, DataError>;

    async fn delete_file(
        &self,
        task_id: &str,
        file_id: &str,
    ) -> Result<Option<TaskFileRow>, DataError>;

    async fn count_hash_refs(&self, project_id: &str, content_hash: &str)
    -> Result<i64, DataError>;

    async fn storage_bytes(&self, project_id: &str) -> Result<i64, DataError>;

    // ==================== Notification Operations ====================

    async fn create_notifications(
        &self,
        batch: &[NewNotification],
    ) -> Result<Vec<NotificationRow>, DataError>;

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<NotificationRow>, u64), DataError>;

    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64, DataError>;

    async fn mark_notification_read(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<NotificationRow>, DataError>;

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, DataError>;

    async fn delete_notification(&self, user_id: &str, id: &str) -> Result<bool, DataError>;

    /// Remove invitation notifications whose invitation is gone
    async fn delete_orphaned_invitation_notifications(
        &self,
        user_id: Option<&str>,
    ) -> Result<u64, DataError>;

    // ==================== Activity Operations ====================

    async fn log_activity(&self, entry: &NewActivity) -> Result<ActivityRow, DataError>;

    async fn list_project_activity(
        &self,
        project_id: &str,
        filter: &ActivityFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRow>, u64), DataError>;

    async fn list_user_activity(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRow>, u64), DataError>;
}
