//! Authorization extractors for Axum handlers
//!
//! These extractors combine authentication (from middleware) with the
//! project role check into a single extraction step.
//!
//! # Usage
//!
//! ```no_run
//! # use projecthub_server::api::auth::ProjectRead;
//! # use projecthub_server::api::types::ApiError;
//! pub async fn list_tasks(access: ProjectRead) -> Result<(), ApiError> {
//!     // access.project_id - validated project ID from path
//!     // access.user_id - authenticated caller
//!     // access.role - caller's team role (at least viewer)
//!     Ok(())
//! }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use serde::Deserialize;

use super::context::{AuthContext, AuthService};
use crate::api::extractors::{ValidationRejection, is_valid_id};
use crate::api::types::ApiError;
use crate::data::types::TeamRole;

// ============================================================================
// Role Markers
// ============================================================================

/// Marker trait for the minimum team role a route requires
pub trait RoleLevel: Send + Sync + 'static {
    const ROLE: TeamRole;
}

/// Any team member (viewer and above)
pub struct Read;
impl RoleLevel for Read {
    const ROLE: TeamRole = TeamRole::Viewer;
}

/// Member and above
pub struct Write;
impl RoleLevel for Write {
    const ROLE: TeamRole = TeamRole::Member;
}

/// Manager and above
pub struct Manage;
impl RoleLevel for Manage {
    const ROLE: TeamRole = TeamRole::Manager;
}

/// Project owner only
pub struct Own;
impl RoleLevel for Own {
    const ROLE: TeamRole = TeamRole::Owner;
}

// ============================================================================
// Auth Rejection
// ============================================================================

/// Rejection type for auth extractors
pub enum AuthRejection {
    /// Path extraction or validation failed
    Path(ValidationRejection),
    /// Authorization failed
    Auth(ApiError),
    /// Auth context not available (middleware not applied)
    MissingContext,
}

impl From<ValidationRejection> for AuthRejection {
    fn from(v: ValidationRejection) -> Self {
        Self::Path(v)
    }
}

impl From<ApiError> for AuthRejection {
    fn from(e: ApiError) -> Self {
        Self::Auth(e)
    }
}

impl axum::response::IntoResponse for AuthRejection {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Path(v) => v.into_response(),
            Self::Auth(e) => e.into_response(),
            Self::MissingContext => {
                ApiError::internal("Auth context not available").into_response()
            }
        }
    }
}

/// Extract auth context and service from request extensions.
fn extract_auth(parts: &Parts) -> Result<(AuthContext, Arc<AuthService>), AuthRejection> {
    let auth = parts
        .extensions
        .get::<AuthContext>()
        .cloned()
        .ok_or(AuthRejection::MissingContext)?;

    let auth_service = parts
        .extensions
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or(AuthRejection::MissingContext)?;

    Ok((auth, auth_service))
}

// ============================================================================
// Project Access Extractors
// ============================================================================

/// Verified project access with a minimum team role.
///
/// Extracts `project_id` from the path and checks the caller's membership.
/// Non-members get 404; members below `Role` get 403.
pub struct ProjectAccess<Role: RoleLevel = Read> {
    pub project_id: String,
    pub user_id: String,
    /// The caller's actual role (at least `Role::ROLE`)
    pub role: TeamRole,
    _role: PhantomData<Role>,
}

pub type ProjectRead = ProjectAccess<Read>;
pub type ProjectWrite = ProjectAccess<Write>;
pub type ProjectManage = ProjectAccess<Manage>;
pub type ProjectOwn = ProjectAccess<Own>;

impl<Role: RoleLevel> ProjectAccess<Role> {
    /// True when the caller may moderate other users' content
    pub fn is_manager(&self) -> bool {
        self.role.has_at_least(TeamRole::Manager)
    }
}

#[derive(Deserialize)]
struct ProjectParams {
    project_id: String,
}

impl<S, Role> FromRequestParts<S> for ProjectAccess<Role>
where
    S: Send + Sync,
    Role: RoleLevel,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<ProjectParams>::from_request_parts(parts, state)
            .await
            .map_err(|e| AuthRejection::Path(ValidationRejection::Path(e)))?;

        if !is_valid_id(&params.project_id) {
            return Err(AuthRejection::Path(ValidationRejection::InvalidId(
                "project_id",
            )));
        }

        let (auth, auth_service) = extract_auth(parts)?;
        let role = auth_service
            .verify_project_role(&auth.user_id, &params.project_id, Role::ROLE)
            .await?;

        Ok(Self {
            project_id: params.project_id,
            user_id: auth.user_id,
            role,
            _role: PhantomData,
        })
    }
}

// ============================================================================
// Simple Auth Extractor (no path parameters)
// ============================================================================

/// Authenticated caller for routes without a project in the path.
///
/// Example: `GET /api/v1/notifications`
pub struct Auth {
    pub ctx: AuthContext,
}

impl Auth {
    pub fn user_id(&self) -> &str {
        &self.ctx.user_id
    }
}

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthRejection::MissingContext)?;

        Ok(Self { ctx })
    }
}
