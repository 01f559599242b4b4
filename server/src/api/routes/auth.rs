//! Authentication API endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::ApiState;
use crate::api::auth::password::{hash_password, verify_password};
use crate::api::auth::{Auth, AuthManager, SessionClaims};
use crate::api::extractors::ValidatedJson;
use crate::api::types::{ApiError, datetime, validate_not_blank};
use crate::core::constants::{NAME_MAX_LEN, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN};
use crate::data::DataError;
use crate::data::TransactionalService;
use crate::data::types::{NewActivity, UserRow};
use crate::domain::Notifier;
use crate::domain::activity::{self, Action};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,

    #[validate(
        length(min = 1, max = NAME_MAX_LEN, message = "Name must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(length(
        min = PASSWORD_MIN_LEN,
        max = PASSWORD_MAX_LEN,
        message = "Password must be 8-128 characters"
    ))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserDto {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            created_at: datetime(row.created_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserDto,
}

impl SessionResponse {
    fn new(token: String, claims: &SessionClaims, user: UserRow) -> Self {
        Self {
            token,
            token_type: "Bearer",
            expires_at: datetime(claims.exp),
            user: user.into(),
        }
    }
}

/// State for the public auth endpoints
#[derive(Clone)]
pub struct AuthRoutesState {
    pub auth_manager: Arc<AuthManager>,
    pub database: Arc<TransactionalService>,
    pub notifier: Notifier,
}

/// Public auth routes (register, login)
pub fn routes(
    auth_manager: Arc<AuthManager>,
    database: Arc<TransactionalService>,
    notifier: Notifier,
) -> Router {
    let state = AuthRoutesState {
        auth_manager,
        database,
        notifier,
    };

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state)
}

fn issue(
    auth_manager: &AuthManager,
    user: UserRow,
) -> Result<SessionResponse, ApiError> {
    let (token, claims) = auth_manager.issue(&user.id).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign session token");
        ApiError::internal("Failed to create session")
    })?;
    Ok(SessionResponse::new(token, &claims, user))
}

/// Create an account and start a session
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register(
    State(state): State<AuthRoutesState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            ApiError::internal("Failed to create account")
        })?;

    let user = state
        .database
        .repository()
        .create_user(&body.email, body.name.trim(), &password_hash)
        .await
        .map_err(|e| match e {
            DataError::Conflict(message) => ApiError::conflict("EMAIL_TAKEN", message),
            e => ApiError::from_data(e),
        })?;

    tracing::debug!(user_id = %user.id, "User registered");
    activity::record(&state.database, NewActivity::new(Action::UserRegistered, &user.id)).await;
    state.notifier.pending_invitations(&user).await;

    let session = issue(&state.auth_manager, user)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Exchange email and password for a session token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session started", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthRoutesState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("INVALID_CREDENTIALS", "Invalid email or password");

    let credentials = state
        .database
        .repository()
        .get_credentials(&body.email)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(invalid)?;

    let password = body.password;
    let stored = credentials.password_hash;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::internal(format!("Password check task failed: {e}")))?;
    if !verified {
        tracing::debug!(user_id = %credentials.user.id, "Login rejected");
        return Err(invalid());
    }

    Ok(Json(issue(&state.auth_manager, credentials.user)?))
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Authenticated user", body = UserDto),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(State(state): State<ApiState>, auth: Auth) -> Result<Json<UserDto>, ApiError> {
    let user = state.load_user(auth.user_id()).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_register_login_me() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "email": "Ada@Example.com", "name": "Ada", "password": "hunter2hunter2" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["token_type"], "Bearer");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "hunter2hunter2" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = app.get("/api/v1/auth/me", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ada");
    }

    #[tokio::test]
    async fn test_register_errors() {
        let app = TestApp::new().await;
        let register = |email: &str, password: &str| {
            json!({ "email": email, "name": "Ada", "password": password })
        };

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(register("not-an-email", "short")),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["email"].is_array());
        assert!(body["fields"]["password"].is_array());

        let ok = register("ada@example.com", "hunter2hunter2");
        let (status, _) = app
            .send(Method::POST, "/api/v1/auth/register", None, Some(ok.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = app
            .send(Method::POST, "/api/v1/auth/register", None, Some(ok))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "EMAIL_TAKEN");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password_and_unknown_email() {
        let app = TestApp::new().await;
        app.send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "ada@example.com", "name": "Ada", "password": "hunter2hunter2" })),
        )
        .await;

        for (email, password) in [("ada@example.com", "wrong-password"), ("nobody@example.com", "x")] {
            let (status, body) = app
                .send(
                    Method::POST,
                    "/api/v1/auth/login",
                    None,
                    Some(json!({ "email": email, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["code"], "INVALID_CREDENTIALS");
        }
    }

    #[tokio::test]
    async fn test_bearer_token_required() {
        let app = TestApp::new().await;
        let (status, body) = app.send(Method::GET, "/api/v1/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_REQUIRED");

        let (status, body) = app.get("/api/v1/auth/me", "garbage").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_INVALID");

        // Valid signature for an account that does not exist
        let token = app.token("ghost");
        let (status, body) = app.get("/api/v1/auth/me", &token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "USER_NOT_FOUND");
    }
}
