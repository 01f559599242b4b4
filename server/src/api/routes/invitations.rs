//! Invitations addressed to the current user

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::ApiState;
use super::team::types::InvitationDto;
use crate::api::auth::Auth;
use crate::api::types::ApiError;
use crate::data::types::{InvitationResponse, NewActivity};
use crate::domain::activity::Action;

#[derive(Deserialize)]
pub struct RespondPath {
    pub invitation_id: String,
}

pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/", get(list_my_invitations))
        .route("/{invitation_id}/accept", post(accept_invitation))
        .route("/{invitation_id}/decline", post(decline_invitation))
        .with_state(state)
}

/// Pending invitations sent to the caller's email
#[utoipa::path(
    get,
    path = "/api/v1/invitations",
    tag = "invitations",
    responses((status = 200, description = "Pending invitations", body = Vec<InvitationDto>))
)]
pub async fn list_my_invitations(
    State(state): State<ApiState>,
    auth: Auth,
) -> Result<Json<Vec<InvitationDto>>, ApiError> {
    let user = state.load_user(auth.user_id()).await?;
    let rows = state
        .database
        .repository()
        .list_pending_invitations(&user.email)
        .await
        .map_err(ApiError::from_data)?;

    Ok(Json(rows.into_iter().map(InvitationDto::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/invitations/{invitation_id}/accept",
    tag = "invitations",
    params(("invitation_id" = String, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Joined the project", body = InvitationDto),
        (status = 403, description = "Invitation is for someone else"),
        (status = 404, description = "Invitation not found"),
        (status = 422, description = "Invitation already answered")
    )
)]
pub async fn accept_invitation(
    State(state): State<ApiState>,
    auth: Auth,
    Path(path): Path<RespondPath>,
) -> Result<Json<InvitationDto>, ApiError> {
    respond(&state, auth.user_id(), &path.invitation_id, true).await
}

#[utoipa::path(
    post,
    path = "/api/v1/invitations/{invitation_id}/decline",
    tag = "invitations",
    params(("invitation_id" = String, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Invitation declined", body = InvitationDto),
        (status = 403, description = "Invitation is for someone else"),
        (status = 404, description = "Invitation not found"),
        (status = 422, description = "Invitation already answered")
    )
)]
pub async fn decline_invitation(
    State(state): State<ApiState>,
    auth: Auth,
    Path(path): Path<RespondPath>,
) -> Result<Json<InvitationDto>, ApiError> {
    respond(&state, auth.user_id(), &path.invitation_id, false).await
}

async fn respond(
    state: &ApiState,
    user_id: &str,
    invitation_id: &str,
    accept: bool,
) -> Result<Json<InvitationDto>, ApiError> {
    let user = state.load_user(user_id).await?;
    let response = state
        .database
        .repository()
        .respond_to_invitation(Some(&state.cache), invitation_id, &user.id, &user.email, accept)
        .await
        .map_err(ApiError::from_data)?;

    let invitation = match response {
        InvitationResponse::Responded(invitation) => invitation,
        InvitationResponse::NotFound => {
            return Err(ApiError::not_found(
                "INVITATION_NOT_FOUND",
                format!("Invitation not found: {}", invitation_id),
            ));
        }
        InvitationResponse::NotRecipient => {
            return Err(ApiError::forbidden(
                "NOT_RECIPIENT",
                "This invitation was sent to a different email address",
            ));
        }
        InvitationResponse::NotPending(status) => {
            return Err(ApiError::field(
                "INVITATION_NOT_PENDING",
                "status",
                format!("Invitation has already been {}", status.as_str()),
            ));
        }
    };

    let action = if accept {
        Action::InvitationAccepted
    } else {
        Action::InvitationDeclined
    };
    state
        .record(
            NewActivity::new(action, &user.id)
                .project(&invitation.project_id)
                .metadata(json!({ "invitation_id": invitation.id, "role": invitation.role })),
        )
        .await;

    Ok(Json(InvitationDto::from(invitation)))
}
