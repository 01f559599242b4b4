//! Team and invitation API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::types::datetime;
use crate::core::constants::INVITATION_MESSAGE_MAX_LEN;
use crate::data::types::{InvitationRow, InvitationStatus, MemberWithUser, TeamRole};

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberDto {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl From<MemberWithUser> for MemberDto {
    fn from(row: MemberWithUser) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            name: row.name,
            role: row.role,
            joined_at: datetime(row.joined_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMemberRequest {
    pub role: TeamRole,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,

    /// Role granted on acceptance (viewer, member or manager)
    #[serde(default)]
    pub role: TeamRole,

    #[validate(length(max = INVITATION_MESSAGE_MAX_LEN, message = "Message is too long"))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListInvitationsQuery {
    pub status: Option<InvitationStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationDto {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub inviter_id: String,
    pub email: String,
    pub role: TeamRole,
    pub status: InvitationStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl From<InvitationRow> for InvitationDto {
    fn from(row: InvitationRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            project_name: row.project_name,
            inviter_id: row.inviter_id,
            email: row.email,
            role: row.role,
            status: row.status,
            message: row.message,
            created_at: datetime(row.created_at),
            responded_at: row.responded_at.map(datetime),
        }
    }
}
