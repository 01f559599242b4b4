//! Team membership and project invitation endpoints
//!
//! Mounted under `/api/v1/projects/{project_id}`. The project owner's
//! membership can be neither changed nor removed.

pub mod types;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::ApiState;
use crate::api::auth::{ProjectManage, ProjectRead};
use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::routes::projects::types::PageQuery;
use crate::api::types::{ApiError, PaginatedResponse};
use crate::data::DataError;
use crate::data::types::{NewActivity, OwnerProtectedResult, TeamRole};
use crate::domain::activity::Action;

use types::{InvitationDto, InviteRequest, ListInvitationsQuery, MemberDto, UpdateMemberRequest};

#[derive(Deserialize)]
pub struct MemberPath {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct InvitationPath {
    pub invitation_id: String,
}

pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/members", get(list_members))
        .route("/members/{user_id}", put(update_member).delete(remove_member))
        .route("/invitations", get(list_invitations).post(create_invitation))
        .route("/invitations/{invitation_id}", delete(revoke_invitation))
        .with_state(state)
}

fn member_not_found(user_id: &str) -> ApiError {
    ApiError::not_found("MEMBER_NOT_FOUND", format!("Member not found: {}", user_id))
}

fn owner_immutable() -> ApiError {
    ApiError::forbidden("OWNER_IMMUTABLE", "The project owner's membership cannot be changed")
}

/// Ownership is never granted through role changes or invitations
fn check_assignable(role: TeamRole) -> Result<(), ApiError> {
    if role == TeamRole::Owner {
        return Err(ApiError::field(
            "INVALID_ROLE",
            "role",
            "Role must be one of viewer, member or manager",
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/members",
    tag = "team",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "Team members"))
)]
pub async fn list_members(
    State(state): State<ApiState>,
    access: ProjectRead,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Json<PaginatedResponse<MemberDto>>, ApiError> {
    let (rows, total) = state
        .database
        .repository()
        .list_members(&access.project_id, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(MemberDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/members/{user_id}",
    tag = "team",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("user_id" = String, Path, description = "Member user ID")
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Role changed"),
        (status = 403, description = "Insufficient role or target is the owner"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn update_member(
    State(state): State<ApiState>,
    access: ProjectManage,
    Path(path): Path<MemberPath>,
    ValidatedJson(body): ValidatedJson<UpdateMemberRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_assignable(body.role)?;

    let member = match state
        .database
        .repository()
        .update_member_role(Some(&state.cache), &access.project_id, &path.user_id, body.role)
        .await
        .map_err(ApiError::from_data)?
    {
        OwnerProtectedResult::Success(member) => member,
        OwnerProtectedResult::Owner => return Err(owner_immutable()),
        OwnerProtectedResult::NotFound => return Err(member_not_found(&path.user_id)),
    };

    state
        .record(
            NewActivity::new(Action::MemberRoleChanged, &access.user_id)
                .project(&access.project_id)
                .metadata(json!({ "user_id": member.user_id, "role": member.role })),
        )
        .await;

    Ok(Json(json!({
        "project_id": member.project_id,
        "user_id": member.user_id,
        "role": member.role,
    })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/members/{user_id}",
    tag = "team",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("user_id" = String, Path, description = "Member user ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Insufficient role or target is the owner"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn remove_member(
    State(state): State<ApiState>,
    access: ProjectManage,
    Path(path): Path<MemberPath>,
) -> Result<StatusCode, ApiError> {
    match state
        .database
        .repository()
        .remove_member(Some(&state.cache), &access.project_id, &path.user_id)
        .await
        .map_err(ApiError::from_data)?
    {
        OwnerProtectedResult::Success(()) => {}
        OwnerProtectedResult::Owner => return Err(owner_immutable()),
        OwnerProtectedResult::NotFound => return Err(member_not_found(&path.user_id)),
    }

    state
        .record(
            NewActivity::new(Action::MemberRemoved, &access.user_id)
                .project(&access.project_id)
                .metadata(json!({ "user_id": path.user_id })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/invitations",
    tag = "team",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("status" = Option<String>, Query, description = "pending, accepted or declined")
    ),
    responses((status = 200, description = "Invitations for the project", body = Vec<InvitationDto>))
)]
pub async fn list_invitations(
    State(state): State<ApiState>,
    access: ProjectManage,
    ValidatedQuery(query): ValidatedQuery<ListInvitationsQuery>,
) -> Result<Json<Vec<InvitationDto>>, ApiError> {
    let rows = state
        .database
        .repository()
        .list_project_invitations(&access.project_id, query.status)
        .await
        .map_err(ApiError::from_data)?;

    Ok(Json(rows.into_iter().map(InvitationDto::from).collect()))
}

/// Invite someone by email; an existing account is notified right away
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/invitations",
    tag = "team",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invitation sent", body = InvitationDto),
        (status = 409, description = "Already a member or already invited"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_invitation(
    State(state): State<ApiState>,
    access: ProjectManage,
    ValidatedJson(body): ValidatedJson<InviteRequest>,
) -> Result<(StatusCode, Json<InvitationDto>), ApiError> {
    check_assignable(body.role)?;
    let email = body.email.trim().to_lowercase();
    let repo = state.database.repository();

    if let Some(user) = repo.get_user_by_email(&email).await.map_err(ApiError::from_data)?
        && repo
            .get_member(Some(&state.cache), &access.project_id, &user.id)
            .await
            .map_err(ApiError::from_data)?
            .is_some()
    {
        return Err(ApiError::conflict(
            "ALREADY_MEMBER",
            "This user is already a member of the project",
        ));
    }

    let message = body.message.as_deref().map(str::trim).filter(|m| !m.is_empty());
    let invitation = repo
        .create_invitation(&access.project_id, &access.user_id, &email, body.role, message)
        .await
        .map_err(|e| match e {
            DataError::Conflict(message) => ApiError::conflict("INVITATION_EXISTS", message),
            e => ApiError::from_data(e),
        })?;

    let inviter = state.load_user(&access.user_id).await?;
    state.notifier.invitation_sent(&invitation, &inviter).await;
    state
        .record(
            NewActivity::new(Action::InvitationSent, &access.user_id)
                .project(&access.project_id)
                .metadata(json!({
                    "invitation_id": invitation.id,
                    "email": invitation.email,
                    "role": invitation.role,
                })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(InvitationDto::from(invitation))))
}

/// Revoke an invitation by deleting it; its notifications become orphans
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/invitations/{invitation_id}",
    tag = "team",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("invitation_id" = String, Path, description = "Invitation ID")
    ),
    responses(
        (status = 204, description = "Invitation revoked"),
        (status = 404, description = "Invitation not found")
    )
)]
pub async fn revoke_invitation(
    State(state): State<ApiState>,
    access: ProjectManage,
    Path(path): Path<InvitationPath>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .database
        .repository()
        .delete_invitation(&access.project_id, &path.invitation_id)
        .await
        .map_err(ApiError::from_data)?;
    if !deleted {
        return Err(ApiError::not_found(
            "INVITATION_NOT_FOUND",
            format!("Invitation not found: {}", path.invitation_id),
        ));
    }

    state
        .record(
            NewActivity::new(Action::InvitationRevoked, &access.user_id)
                .project(&access.project_id)
                .metadata(json!({ "invitation_id": path.invitation_id })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
