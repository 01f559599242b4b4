//! API route handlers

pub mod activity;
pub mod auth;
pub mod health;
pub mod invitations;
pub mod notifications;
pub mod projects;
pub mod reports;
pub mod risks;
pub mod tasks;
pub mod team;

use std::sync::Arc;

use crate::api::auth::project_not_found;
use crate::api::types::ApiError;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;
use crate::data::files::FileService;
use crate::data::types::{NewActivity, ProjectRow, TaskRow, UserRow};
use crate::domain::Notifier;
use crate::domain::activity as activity_log;

/// Shared state for the authenticated API routes
#[derive(Clone)]
pub struct ApiState {
    pub database: Arc<TransactionalService>,
    pub cache: Arc<CacheService>,
    pub notifier: Notifier,
    pub files: Arc<FileService>,
}

impl ApiState {
    pub async fn load_project(&self, project_id: &str) -> Result<ProjectRow, ApiError> {
        self.database
            .repository()
            .get_project(Some(&self.cache), project_id)
            .await
            .map_err(ApiError::from_data)?
            .ok_or_else(|| project_not_found(project_id))
    }

    /// Task scoped to its project; a task of another project is not found
    pub async fn load_task(&self, project_id: &str, task_id: &str) -> Result<TaskRow, ApiError> {
        self.database
            .repository()
            .get_task(project_id, task_id)
            .await
            .map_err(ApiError::from_data)?
            .ok_or_else(|| {
                ApiError::not_found("TASK_NOT_FOUND", format!("Task not found: {}", task_id))
            })
    }

    pub async fn load_user(&self, user_id: &str) -> Result<UserRow, ApiError> {
        self.database
            .repository()
            .get_user(Some(&self.cache), user_id)
            .await
            .map_err(ApiError::from_data)?
            .ok_or_else(|| {
                ApiError::not_found("USER_NOT_FOUND", format!("User not found: {}", user_id))
            })
    }

    pub async fn record(&self, entry: NewActivity) {
        activity_log::record(&self.database, entry).await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-process app over an in-memory database for route tests

    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::api::auth::AuthManager;
    use crate::api::middleware::AllowedOrigins;
    use crate::api::server::{ApiServices, build_router};
    use crate::core::config::{CacheConfig, RateLimitConfig};
    use crate::data::TransactionalService;
    use crate::data::cache::CacheService;
    use crate::data::files::{FileService, FilesystemStorage};
    use crate::data::sqlite::repositories::test_support::{seed_user, setup_test_pool};
    use crate::data::types::{TeamRole, UserRow};
    use crate::domain::Notifier;

    pub struct TestApp {
        pub router: Router,
        pub database: Arc<TransactionalService>,
        auth_manager: Arc<AuthManager>,
        _files_dir: TempDir,
    }

    impl TestApp {
        pub async fn new() -> Self {
            let database = Arc::new(TransactionalService::from_pool(setup_test_pool().await));
            let cache = Arc::new(CacheService::new(&CacheConfig { max_entries: 1000 }));
            let files_dir = TempDir::new().unwrap();
            let files = Arc::new(FileService::with_storage(
                Arc::new(FilesystemStorage::new(files_dir.path().to_path_buf())),
                Arc::clone(&database),
            ));
            let auth_manager = Arc::new(AuthManager::with_key(vec![7u8; 32], 24));

            let services = ApiServices {
                database: Arc::clone(&database),
                cache,
                auth_manager: Arc::clone(&auth_manager),
                notifier: Notifier::new(Arc::clone(&database)),
                files,
            };
            let rate_limit = RateLimitConfig {
                enabled: false,
                ..RateLimitConfig::default()
            };
            let origins = AllowedOrigins::new("127.0.0.1", 8080, &[]);
            let router = build_router(&services, &rate_limit, &origins);

            Self {
                router,
                database,
                auth_manager,
                _files_dir: files_dir,
            }
        }

        pub fn token(&self, user_id: &str) -> String {
            self.auth_manager.issue(user_id).unwrap().0
        }

        /// Seeded user with a session token
        pub async fn user(&self, email: &str) -> (UserRow, String) {
            let user = seed_user(self.database.pool(), email).await;
            let token = self.token(&user.id);
            (user, token)
        }

        /// Add `user_id` to a project with `role`
        pub async fn join(&self, project_id: &str, user_id: &str, role: TeamRole) {
            sqlx::query(
                "INSERT INTO team_members (project_id, user_id, role, joined_at) VALUES (?, ?, ?, 0)",
            )
            .bind(project_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(self.database.pool())
            .await
            .unwrap();
        }

        pub async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.send_request(request).await
        }

        pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                })
            };
            (status, value)
        }

        pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
            self.send(Method::GET, uri, Some(token), None).await
        }

        pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
            self.send(Method::POST, uri, Some(token), Some(body)).await
        }

        pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
            self.send(Method::PUT, uri, Some(token), Some(body)).await
        }

        pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
            self.send(Method::DELETE, uri, Some(token), None).await
        }

        /// Create a project through the API and return its id
        pub async fn project(&self, token: &str, budget_cents: i64) -> String {
            let (status, body) = self
                .post(
                    "/api/v1/projects",
                    token,
                    serde_json::json!({ "name": "Apollo", "total_budget_cents": budget_cents }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body["id"].as_str().unwrap().to_string()
        }

        pub async fn task(&self, token: &str, project_id: &str, title: &str) -> String {
            let (status, body) = self
                .post(
                    &format!("/api/v1/projects/{project_id}/tasks"),
                    token,
                    serde_json::json!({ "title": title }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body["id"].as_str().unwrap().to_string()
        }
    }
}
