//! Authentication middleware

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use axum_extra::typed_header::TypedHeaderRejection;
use serde_json::json;

use super::context::{AuthContext, AuthService};
use super::jwt::JwtError;
use super::manager::AuthManager;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;

/// Authentication error response
#[derive(Debug)]
pub struct AuthError {
    pub status: StatusCode,
    pub error: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    fn unauthorized(code: &'static str, message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "unauthorized",
            code,
            message: message.to_string(),
        }
    }

    pub fn required() -> Self {
        Self::unauthorized("AUTH_REQUIRED", "Authentication required")
    }

    pub fn expired() -> Self {
        Self::unauthorized("TOKEN_EXPIRED", "Session has expired")
    }

    pub fn invalid() -> Self {
        Self::unauthorized("TOKEN_INVALID", "Invalid session token")
    }

    pub fn unknown_user() -> Self {
        Self::unauthorized("USER_NOT_FOUND", "Account no longer exists")
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "internal_error",
            code: "INTERNAL",
            message: "Authentication check failed".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error,
            "code": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Shared auth state for middleware
#[derive(Clone)]
pub struct AuthState {
    pub auth_manager: Arc<AuthManager>,
    pub database: Arc<TransactionalService>,
    pub cache: Arc<CacheService>,
}

/// Bearer-token authentication middleware
///
/// Injects into request extensions:
/// - `AuthContext` - the authenticated user
/// - `Arc<AuthService>` - cached authorization service
pub async fn require_auth(
    State(state): State<AuthState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|e| {
        if e.is_missing() {
            AuthError::required()
        } else {
            AuthError::invalid()
        }
    })?;

    let claims = state
        .auth_manager
        .validate_session(bearer.token())
        .map_err(|e| match e {
            JwtError::Expired => AuthError::expired(),
            e => {
                tracing::debug!(error = %e, "Rejected session token");
                AuthError::invalid()
            }
        })?;

    // Tokens outlive deleted accounts
    let user = state
        .database
        .repository()
        .get_user(Some(&state.cache), claims.user_id())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load session user");
            AuthError::internal()
        })?
        .ok_or_else(AuthError::unknown_user)?;

    let auth_service = Arc::new(AuthService::new(
        state.database.clone(),
        state.cache.clone(),
    ));
    request.extensions_mut().insert(auth_service);
    request
        .extensions_mut()
        .insert(AuthContext { user_id: user.id });

    Ok(next.run(request).await)
}
