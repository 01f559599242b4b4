//! Authentication context and authorization service
//!
//! `AuthContext` carries the authenticated user; `AuthService` resolves the
//! caller's team role in a project through the cached membership lookup.

use std::sync::Arc;

use crate::api::types::ApiError;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;
use crate::data::types::TeamRole;

/// Authenticated caller, injected by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

/// Authorization service with cached membership lookups
#[derive(Clone)]
pub struct AuthService {
    database: Arc<TransactionalService>,
    cache: Arc<CacheService>,
}

impl AuthService {
    pub fn new(database: Arc<TransactionalService>, cache: Arc<CacheService>) -> Self {
        Self { database, cache }
    }

    /// Resolve the caller's role in a project.
    ///
    /// Non-members get the same 404 as a missing project so that project
    /// existence is not disclosed.
    pub async fn project_role(&self, user_id: &str, project_id: &str) -> Result<TeamRole, ApiError> {
        let member = self
            .database
            .repository()
            .get_member(Some(&self.cache), project_id, user_id)
            .await
            .map_err(ApiError::from_data)?;

        match member {
            Some(m) => Ok(m.role),
            None => Err(project_not_found(project_id)),
        }
    }

    /// Verify the caller holds at least `required` in the project
    pub async fn verify_project_role(
        &self,
        user_id: &str,
        project_id: &str,
        required: TeamRole,
    ) -> Result<TeamRole, ApiError> {
        let role = self.project_role(user_id, project_id).await?;
        if !role.has_at_least(required) {
            tracing::debug!(%user_id, %project_id, %role, %required, "Insufficient project role");
            return Err(ApiError::forbidden(
                "INSUFFICIENT_ROLE",
                format!("This operation requires the '{}' role", required),
            ));
        }
        Ok(role)
    }
}

pub fn project_not_found(project_id: &str) -> ApiError {
    ApiError::not_found(
        "PROJECT_NOT_FOUND",
        format!("Project not found: {}", project_id),
    )
}
