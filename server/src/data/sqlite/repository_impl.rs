//! TransactionalRepository implementation for SQLite
//!
//! Implemented for `Arc<SqliteService>`; every method delegates to a
//! repository free function and converts `SqliteError` into `DataError`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::cache::CacheService;
use crate::data::error::DataError;
use crate::data::traits::TransactionalRepository;
use crate::data::types::{
    ActivityFilter, ActivityRow, BudgetHistoryRow, BudgetWriteResult, CategoryTotal, CommentRow,
    ExpenseRow, InvitationResponse, InvitationRow, InvitationStatus, MemberRow, MemberWithUser,
    NewActivity, NewExpense, NewNotification, NewProject, NewRisk, NewTask, NewTaskFile,
    NotificationRow, OwnerProtectedResult, ProjectRow, ProjectStatus, ProjectUpdate,
    ProjectWithRole, RiskRow, RiskStatus, RiskUpdate, TaskDueRow, TaskFileRow, TaskFilter,
    TaskRow, TaskStats, TaskUpdate, TeamRole, UserCredentials, UserRow,
};

use super::SqliteService;
use super::repositories::{
    activity, budget, comment, file, invitation, notification, project, risk, task, team, user,
};

#[async_trait]
impl TransactionalRepository for Arc<SqliteService> {
    // ==================== User Operations ====================

    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<UserRow, DataError> {
        user::create_user(self.pool(), email, name, password_hash)
            .await
            .map_err(Into::into)
    }

    async fn get_user(
        &self,
        cache: Option<&CacheService>,
        id: &str,
    ) -> Result<Option<UserRow>, DataError> {
        user::get_user(self.pool(), cache, id)
            .await
            .map_err(Into::into)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, DataError> {
        user::get_by_email(self.pool(), email)
            .await
            .map_err(Into::into)
    }

    async fn get_credentials(&self, email: &str) -> Result<Option<UserCredentials>, DataError> {
        user::get_credentials(self.pool(), email)
            .await
            .map_err(Into::into)
    }

    // ==================== Project Operations ====================

    async fn create_project(
        &self,
        owner_id: &str,
        new: &NewProject,
    ) -> Result<ProjectRow, DataError> {
        project::create_project(self.pool(), owner_id, new)
            .await
            .map_err(Into::into)
    }

    async fn get_project(
        &self,
        cache: Option<&CacheService>,
        id: &str,
    ) -> Result<Option<ProjectRow>, DataError> {
        project::get_project(self.pool(), cache, id)
            .await
            .map_err(Into::into)
    }

    async fn list_projects_for_user(
        &self,
        user_id: &str,
        status: Option<ProjectStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ProjectWithRole>, u64), DataError> {
        project::list_for_user(self.pool(), user_id, status, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn update_project(
        &self,
        cache: Option<&CacheService>,
        id: &str,
        update: &ProjectUpdate,
    ) -> Result<Option<ProjectRow>, DataError> {
        project::update_project(self.pool(), cache, id, update)
            .await
            .map_err(Into::into)
    }

    async fn delete_project(
        &self,
        cache: Option<&CacheService>,
        id: &str,
    ) -> Result<bool, DataError> {
        project::delete_project(self.pool(), cache, id)
            .await
            .map_err(Into::into)
    }

    async fn list_projects_ending_between(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<ProjectRow>, DataError> {
        project::list_ending_between(self.pool(), from, to)
            .await
            .map_err(Into::into)
    }

    async fn list_projects_with_budget(&self) -> Result<Vec<ProjectRow>, DataError> {
        project::list_with_budget(self.pool())
            .await
            .map_err(Into::into)
    }

    // ==================== Budget Operations ====================

    async fn set_total_budget(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
        new_total_cents: i64,
        note: Option<&str>,
    ) -> Result<BudgetWriteResult<ProjectRow>, DataError> {
        budget::set_total_budget(self.pool(), cache, project_id, user_id, new_total_cents, note)
            .await
            .map_err(Into::into)
    }

    async fn add_expense(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
        expense: &NewExpense,
    ) -> Result<BudgetWriteResult<(ExpenseRow, ProjectRow)>, DataError> {
        budget::add_expense(self.pool(), cache, project_id, user_id, expense)
            .await
            .map_err(Into::into)
    }

    async fn delete_expense(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        expense_id: &str,
        user_id: &str,
    ) -> Result<Option<(ExpenseRow, ProjectRow)>, DataError> {
        budget::delete_expense(self.pool(), cache, project_id, expense_id, user_id)
            .await
            .map_err(Into::into)
    }

    async fn list_expenses(
        &self,
        project_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ExpenseRow>, u64), DataError> {
        budget::list_expenses(self.pool(), project_id, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn list_budget_history(
        &self,
        project_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<BudgetHistoryRow>, u64), DataError> {
        budget::list_history(self.pool(), project_id, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn expense_totals_by_category(
        &self,
        project_id: &str,
    ) -> Result<Vec<CategoryTotal>, DataError> {
        budget::totals_by_category(self.pool(), project_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Team Operations ====================

    async fn get_member(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRow>, DataError> {
        team::get_member(self.pool(), cache, project_id, user_id)
            .await
            .map_err(Into::into)
    }

    async fn list_members(
        &self,
        project_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<MemberWithUser>, u64), DataError> {
        team::list_members(self.pool(), project_id, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn list_member_ids(&self, project_id: &str) -> Result<Vec<String>, DataError> {
        team::list_member_ids(self.pool(), project_id)
            .await
            .map_err(Into::into)
    }

    async fn update_member_role(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
        role: TeamRole,
    ) -> Result<OwnerProtectedResult<MemberRow>, DataError> {
        team::update_role(self.pool(), cache, project_id, user_id, role)
            .await
            .map_err(Into::into)
    }

    async fn remove_member(
        &self,
        cache: Option<&CacheService>,
        project_id: &str,
        user_id: &str,
    ) -> Result<OwnerProtectedResult<()>, DataError> {
        team::remove_member(self.pool(), cache, project_id, user_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Invitation Operations ====================

    async fn create_invitation(
        &self,
        project_id: &str,
        inviter_id: &str,
        email: &str,
        role: TeamRole,
        message: Option<&str>,
    ) -> Result<InvitationRow, DataError> {
        invitation::create_invitation(self.pool(), project_id, inviter_id, email, role, message)
            .await
            .map_err(Into::into)
    }

    async fn list_project_invitations(
        &self,
        project_id: &str,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationRow>, DataError> {
        invitation::list_for_project(self.pool(), project_id, status)
            .await
            .map_err(Into::into)
    }

    async fn list_pending_invitations(
        &self,
        email: &str,
    ) -> Result<Vec<InvitationRow>, DataError> {
        invitation::list_pending_for_email(self.pool(), email)
            .await
            .map_err(Into::into)
    }

    async fn delete_invitation(&self, project_id: &str, id: &str) -> Result<bool, DataError> {
        invitation::delete_invitation(self.pool(), project_id, id)
            .await
            .map_err(Into::into)
    }

    async fn respond_to_invitation(
        &self,
        cache: Option<&CacheService>,
        id: &str,
        user_id: &str,
        user_email: &str,
        accept: bool,
    ) -> Result<InvitationResponse, DataError> {
        invitation::respond(self.pool(), cache, id, user_id, user_email, accept)
            .await
            .map_err(Into::into)
    }

    // ==================== Task Operations ====================

    async fn create_task(
        &self,
        project_id: &str,
        created_by: &str,
        new: &NewTask,
    ) -> Result<TaskRow, DataError> {
        task::create_task(self.pool(), project_id, created_by, new)
            .await
            .map_err(Into::into)
    }

    async fn get_task(
        &self,
        project_id: &str,
        task_id: &str,
    ) -> Result<Option<TaskRow>, DataError> {
        task::get_task(self.pool(), project_id, task_id)
            .await
            .map_err(Into::into)
    }

    async fn list_tasks(
        &self,
        project_id: &str,
        filter: &TaskFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<TaskRow>, u64), DataError> {
        task::list_tasks(self.pool(), project_id, filter, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn update_task(
        &self,
        project_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> Result<Option<TaskRow>, DataError> {
        task::update_task(self.pool(), project_id, task_id, update)
            .await
            .map_err(Into::into)
    }

    async fn delete_task(&self, project_id: &str, task_id: &str) -> Result<bool, DataError> {
        task::delete_task(self.pool(), project_id, task_id)
            .await
            .map_err(Into::into)
    }

    async fn assign_user(
        &self,
        task_id: &str,
        user_id: &str,
        assigned_by: &str,
    ) -> Result<(), DataError> {
        task::assign_user(self.pool(), task_id, user_id, assigned_by)
            .await
            .map_err(Into::into)
    }

    async fn unassign_user(&self, task_id: &str, user_id: &str) -> Result<bool, DataError> {
        task::unassign_user(self.pool(), task_id, user_id)
            .await
            .map_err(Into::into)
    }

    async fn list_tasks_due_between(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<TaskDueRow>, DataError> {
        task::list_due_between(self.pool(), from, to)
            .await
            .map_err(Into::into)
    }

    async fn task_stats(&self, project_id: &str, today: &str) -> Result<TaskStats, DataError> {
        task::task_stats(self.pool(), project_id, today)
            .await
            .map_err(Into::into)
    }

    // ==================== Risk Operations ====================

    async fn create_risk(
        &self,
        project_id: &str,
        created_by: &str,
        new: &NewRisk,
    ) -> Result<RiskRow, DataError> {
        risk::create_risk(self.pool(), project_id, created_by, new)
            .await
            .map_err(Into::into)
    }

    async fn get_risk(
        &self,
        project_id: &str,
        risk_id: &str,
    ) -> Result<Option<RiskRow>, DataError> {
        risk::get_risk(self.pool(), project_id, risk_id)
            .await
            .map_err(Into::into)
    }

    async fn list_risks(
        &self,
        project_id: &str,
        status: Option<RiskStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RiskRow>, u64), DataError> {
        risk::list_risks(self.pool(), project_id, status, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn list_all_risks(&self, project_id: &str) -> Result<Vec<RiskRow>, DataError> {
        risk::list_all_for_project(self.pool(), project_id)
            .await
            .map_err(Into::into)
    }

    async fn update_risk(
        &self,
        project_id: &str,
        risk_id: &str,
        update: &RiskUpdate,
    ) -> Result<Option<RiskRow>, DataError> {
        risk::update_risk(self.pool(), project_id, risk_id, update)
            .await
            .map_err(Into::into)
    }

    async fn delete_risk(&self, project_id: &str, risk_id: &str) -> Result<bool, DataError> {
        risk::delete_risk(self.pool(), project_id, risk_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Comment Operations ====================

    async fn create_comment(
        &self,
        task_id: &str,
        user_id: &str,
        body: &str,
    ) -> Result<CommentRow, DataError> {
        comment::create_comment(self.pool(), task_id, user_id, body)
            .await
            .map_err(Into::into)
    }

    async fn get_comment(
        &self,
        task_id: &str,
        comment_id: &str,
    ) -> Result<Option<CommentRow>, DataError> {
        comment::get_comment(self.pool(), task_id, comment_id)
            .await
            .map_err(Into::into)
    }

    async fn list_comments(
        &self,
        task_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<CommentRow>, u64), DataError> {
        comment::list_comments(self.pool(), task_id, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn update_comment(
        &self,
        task_id: &str,
        comment_id: &str,
        body: &str,
    ) -> Result<Option<CommentRow>, DataError> {
        comment::update_comment(self.pool(), task_id, comment_id, body)
            .await
            .map_err(Into::into)
    }

    async fn delete_comment(&self, task_id: &str, comment_id: &str) -> Result<bool, DataError> {
        comment::delete_comment(self.pool(), task_id, comment_id)
            .await
            .map_err(Into::into)
    }

    // ==================== File Operations ====================

    async fn create_file(
        &self,
        project_id: &str,
        task_id: &str,
        uploader_id: &str,
        new: &NewTaskFile,
    ) -> Result<TaskFileRow, DataError> {
        file::create_file(self.pool(), project_id, task_id, uploader_id, new)
            .await
            .map_err(Into::into)
    }

    async fn get_file(
        &self,
        task_id: &str,
        file_id: &str,
    ) -> Result<Option<TaskFileRow>, DataError> {
        file::get_file(self.pool(), task_id, file_id)
            .await
            .map_err(Into::into)
    }

    async fn list_files(&self, task_id: &str) -> Result<Vec<TaskFileRow>, DataError> {
        file::list_files(self.pool(), task_id)
            .await
            .map_err(Into::into)
    }

    async fn delete_file(
        &self,
        task_id: &str,
        file_id: &str,
    ) -> Result<Option<TaskFileRow>, DataError> {
        file::delete_file(self.pool(), task_id, file_id)
            .await
            .map_err(Into::into)
    }

    async fn count_hash_refs(
        &self,
        project_id: &str,
        content_hash: &str,
    ) -> Result<i64, DataError> {
        file::count_hash_refs(self.pool(), project_id, content_hash)
            .await
            .map_err(Into::into)
    }

    async fn storage_bytes(&self, project_id: &str) -> Result<i64, DataError> {
        file::storage_bytes(self.pool(), project_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Notification Operations ====================

    async fn create_notifications(
        &self,
        batch: &[NewNotification],
    ) -> Result<Vec<NotificationRow>, DataError> {
        notification::create_many(self.pool(), batch)
            .await
            .map_err(Into::into)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<NotificationRow>, u64), DataError> {
        notification::list_for_user(self.pool(), user_id, unread_only, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64, DataError> {
        notification::count_unread(self.pool(), user_id)
            .await
            .map_err(Into::into)
    }

    async fn mark_notification_read(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<NotificationRow>, DataError> {
        notification::mark_read(self.pool(), user_id, id)
            .await
            .map_err(Into::into)
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, DataError> {
        notification::mark_all_read(self.pool(), user_id)
            .await
            .map_err(Into::into)
    }

    async fn delete_notification(&self, user_id: &str, id: &str) -> Result<bool, DataError> {
        notification::delete_notification(self.pool(), user_id, id)
            .await
            .map_err(Into::into)
    }

    async fn delete_orphaned_invitation_notifications(
        &self,
        user_id: Option<&str>,
    ) -> Result<u64, DataError> {
        notification::delete_orphaned_invitation_notifications(self.pool(), user_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Activity Operations ====================

    async fn log_activity(&self, entry: &NewActivity) -> Result<ActivityRow, DataError> {
        activity::log_activity(self.pool(), entry)
            .await
            .map_err(Into::into)
    }

    async fn list_project_activity(
        &self,
        project_id: &str,
        filter: &ActivityFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRow>, u64), DataError> {
        activity::list_for_project(self.pool(), project_id, filter, page, limit)
            .await
            .map_err(Into::into)
    }

    async fn list_user_activity(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRow>, u64), DataError> {
        activity::list_for_user(self.pool(), user_id, page, limit)
            .await
            .map_err(Into::into)
    }
}
