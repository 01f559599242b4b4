//! Notification payloads and recipient fan-out
//!
//! A notification row stores `kind`, its polymorphic subject and the payload
//! as JSON. `NotificationPayload` is the single source for all three.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::TransactionalService;
use crate::data::error::DataError;
use crate::data::types::{
    CommentRow, InvitationRow, NewNotification, ProjectRow, SubjectType, TaskFileRow, TaskRow,
    TeamRole, UserRow,
};

const EXCERPT_CHARS: usize = 140;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    CommentAdded {
        project_id: String,
        project_name: String,
        task_id: String,
        task_title: String,
        comment_id: String,
        actor_name: String,
        excerpt: String,
    },
    FileUploaded {
        project_id: String,
        project_name: String,
        task_id: String,
        task_title: String,
        file_id: String,
        file_name: String,
        actor_name: String,
    },
    InvitationReceived {
        invitation_id: String,
        project_id: String,
        project_name: String,
        inviter_name: Option<String>,
        role: TeamRole,
        message: Option<String>,
    },
    TaskAssigned {
        project_id: String,
        project_name: String,
        task_id: String,
        task_title: String,
        actor_name: String,
    },
    TaskDueSoon {
        project_id: String,
        project_name: String,
        task_id: String,
        task_title: String,
        due_date: String,
        days_left: i64,
    },
    ProjectEndingSoon {
        project_id: String,
        project_name: String,
        end_date: String,
        days_left: i64,
    },
    BudgetThreshold {
        project_id: String,
        project_name: String,
        total_budget_cents: i64,
        actual_expenditure_cents: i64,
        remaining_percent: f64,
    },
}

impl NotificationPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CommentAdded { .. } => "comment_added",
            Self::FileUploaded { .. } => "file_uploaded",
            Self::InvitationReceived { .. } => "invitation_received",
            Self::TaskAssigned { .. } => "task_assigned",
            Self::TaskDueSoon { .. } => "task_due_soon",
            Self::ProjectEndingSoon { .. } => "project_ending_soon",
            Self::BudgetThreshold { .. } => "budget_threshold",
        }
    }

    /// Polymorphic owner stored in `(subject_type, subject_id)`
    pub fn subject(&self) -> (SubjectType, &str) {
        match self {
            Self::CommentAdded { task_id, .. }
            | Self::FileUploaded { task_id, .. }
            | Self::TaskAssigned { task_id, .. }
            | Self::TaskDueSoon { task_id, .. } => (SubjectType::Task, task_id),
            Self::InvitationReceived { invitation_id, .. } => {
                (SubjectType::Invitation, invitation_id)
            }
            Self::ProjectEndingSoon { project_id, .. }
            | Self::BudgetThreshold { project_id, .. } => (SubjectType::Project, project_id),
        }
    }

    pub fn for_recipients(
        &self,
        recipients: &[String],
    ) -> Result<Vec<NewNotification>, serde_json::Error> {
        let payload = serde_json::to_value(self)?;
        let (subject_type, subject_id) = self.subject();
        Ok(recipients
            .iter()
            .map(|user_id| NewNotification {
                user_id: user_id.clone(),
                kind: self.kind().to_string(),
                subject_type,
                subject_id: subject_id.to_string(),
                payload: payload.clone(),
            })
            .collect())
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

/// Task assignees plus the project owner, without the actor
fn task_audience(project: &ProjectRow, task: &TaskRow, actor_id: &str) -> Vec<String> {
    let mut recipients: Vec<String> = task
        .assignee_ids
        .iter()
        .chain(std::iter::once(&project.owner_id))
        .filter(|id| id.as_str() != actor_id)
        .cloned()
        .collect();
    recipients.sort();
    recipients.dedup();
    recipients
}

/// Inserts notifications for state changes.
///
/// Event methods never fail: errors are logged and the triggering request
/// goes on. `deliver` returns the error for callers that count deliveries.
#[derive(Clone)]
pub struct Notifier {
    database: Arc<TransactionalService>,
}

impl Notifier {
    pub fn new(database: Arc<TransactionalService>) -> Self {
        Self { database }
    }

    /// Insert one notification per recipient. Returns the number inserted.
    pub async fn deliver(
        &self,
        recipients: &[String],
        payload: &NotificationPayload,
    ) -> Result<usize, DataError> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let batch = match payload.for_recipients(recipients) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(kind = payload.kind(), error = %e, "Failed to encode notification");
                return Ok(0);
            }
        };

        let created = self.database.repository().create_notifications(&batch).await?;
        tracing::debug!(kind = payload.kind(), count = created.len(), "Notifications created");
        Ok(created.len())
    }

    async fn fan_out(&self, recipients: &[String], payload: NotificationPayload) {
        if let Err(e) = self.deliver(recipients, &payload).await {
            tracing::warn!(kind = payload.kind(), error = %e, "Notification fan-out failed");
        }
    }

    pub async fn comment_added(
        &self,
        project: &ProjectRow,
        task: &TaskRow,
        comment: &CommentRow,
    ) {
        let recipients = task_audience(project, task, &comment.user_id);
        let payload = NotificationPayload::CommentAdded {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            comment_id: comment.id.clone(),
            actor_name: comment.author_name.clone(),
            excerpt: excerpt(&comment.body),
        };
        self.fan_out(&recipients, payload).await;
    }

    pub async fn file_uploaded(
        &self,
        project: &ProjectRow,
        task: &TaskRow,
        file: &TaskFileRow,
        actor: &UserRow,
    ) {
        let recipients = task_audience(project, task, &actor.id);
        let payload = NotificationPayload::FileUploaded {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            file_id: file.id.clone(),
            file_name: file.original_name.clone(),
            actor_name: actor.name.clone(),
        };
        self.fan_out(&recipients, payload).await;
    }

    pub async fn task_assigned(
        &self,
        project: &ProjectRow,
        task: &TaskRow,
        assignee_id: &str,
        actor: &UserRow,
    ) {
        if assignee_id == actor.id {
            return;
        }
        let payload = NotificationPayload::TaskAssigned {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            actor_name: actor.name.clone(),
        };
        self.fan_out(&[assignee_id.to_string()], payload).await;
    }

    /// Notify the invited user if an account with that email exists
    pub async fn invitation_sent(&self, invitation: &InvitationRow, inviter: &UserRow) {
        let recipient = match self
            .database
            .repository()
            .get_user_by_email(&invitation.email)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!(invitation_id = %invitation.id, "Invitee has no account yet");
                return;
            }
            Err(e) => {
                tracing::warn!(invitation_id = %invitation.id, error = %e, "Invitee lookup failed");
                return;
            }
        };

        let payload = invitation_payload(invitation, Some(inviter.name.clone()));
        self.fan_out(&[recipient.id], payload).await;
    }

    /// Notify a freshly registered user of invitations sent before signup
    pub async fn pending_invitations(&self, user: &UserRow) {
        let repo = self.database.repository();
        let invitations = match repo.list_pending_invitations(&user.email).await {
            Ok(invitations) => invitations,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Pending invitation lookup failed");
                return;
            }
        };

        for invitation in &invitations {
            let inviter_name = match repo.get_user(None, &invitation.inviter_id).await {
                Ok(inviter) => inviter.map(|u| u.name),
                Err(e) => {
                    tracing::warn!(error = %e, "Inviter lookup failed");
                    None
                }
            };
            let payload = invitation_payload(invitation, inviter_name);
            self.fan_out(std::slice::from_ref(&user.id), payload).await;
        }
    }
}

fn invitation_payload(invitation: &InvitationRow, inviter_name: Option<String>) -> NotificationPayload {
    NotificationPayload::InvitationReceived {
        invitation_id: invitation.id.clone(),
        project_id: invitation.project_id.clone(),
        project_name: invitation.project_name.clone(),
        inviter_name,
        role: invitation.role,
        message: invitation.message.clone(),
    }
}
