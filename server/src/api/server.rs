//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::auth::{AuthManager, AuthState, require_auth};
use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::rate_limit::{KeyExtractor, RateLimitState, rate_limit_middleware};
use super::routes::{
    ApiState, activity, auth, health, invitations, notifications, projects, reports, risks, tasks,
    team,
};
use crate::core::CoreApp;
use crate::core::config::RateLimitConfig;
use crate::core::constants::{AUTH_BODY_LIMIT, DEFAULT_BODY_LIMIT, UPLOAD_BODY_LIMIT};
use crate::data::TransactionalService;
use crate::data::cache::{CacheService, RateLimitBucket, RateLimiter};
use crate::data::files::FileService;
use crate::domain::Notifier;

/// Services the HTTP layer depends on
#[derive(Clone)]
pub struct ApiServices {
    pub database: Arc<TransactionalService>,
    pub cache: Arc<CacheService>,
    pub auth_manager: Arc<AuthManager>,
    pub notifier: Notifier,
    pub files: Arc<FileService>,
}

impl ApiServices {
    fn api_state(&self) -> ApiState {
        ApiState {
            database: self.database.clone(),
            cache: self.cache.clone(),
            notifier: self.notifier.clone(),
            files: self.files.clone(),
        }
    }
}

/// Build the full application router
///
/// Every `/api/v1` group except health and the public auth endpoints sits
/// behind bearer authentication. Rate limiting wraps authentication so
/// rejected clients never reach the token check.
pub fn build_router(
    services: &ApiServices,
    rate_limit: &RateLimitConfig,
    allowed_origins: &AllowedOrigins,
) -> Router {
    let state = services.api_state();
    let limiter = Arc::new(RateLimiter::new(services.cache.clone()));

    let auth_state = AuthState {
        auth_manager: services.auth_manager.clone(),
        database: services.database.clone(),
        cache: services.cache.clone(),
    };
    let protect = |router: Router| {
        router.layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            require_auth,
        ))
    };

    // Auth is always keyed by client IP; api and files only when per_ip is set
    let shared_key = if rate_limit.per_ip {
        KeyExtractor::IpAddress
    } else {
        KeyExtractor::Global
    };
    let limit = |router: Router, bucket: RateLimitBucket, key_extractor: KeyExtractor| {
        if !rate_limit.enabled {
            return router;
        }
        router.layer(axum::middleware::from_fn_with_state(
            RateLimitState {
                limiter: limiter.clone(),
                bucket,
                key_extractor,
            },
            rate_limit_middleware,
        ))
    };
    let api = |router: Router| {
        limit(
            protect(router),
            RateLimitBucket::api(rate_limit.api_rpm),
            shared_key,
        )
    };

    let auth_routes = limit(
        auth::routes(
            services.auth_manager.clone(),
            services.database.clone(),
            services.notifier.clone(),
        )
        .layer(DefaultBodyLimit::max(AUTH_BODY_LIMIT)),
        RateLimitBucket::auth(rate_limit.auth_rpm),
        KeyExtractor::IpAddress,
    );
    let me_routes = api(Router::new()
        .route("/", get(auth::me))
        .with_state(state.clone()));

    // Project sub-resources mounted directly under the project path
    let project_scoped = team::routes(state.clone())
        .merge(activity::project_routes(state.clone()))
        .merge(reports::routes(state.clone()));

    let file_routes = limit(
        protect(tasks::files::routes(state.clone()).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))),
        RateLimitBucket::files(rate_limit.files_rpm),
        shared_key,
    );

    let health_routes = Router::new()
        .route("/", get(health::health))
        .with_state(services.database.clone());

    Router::new()
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/docs", get(swagger_ui_html))
        .route("/api/docs/", get(swagger_ui_html))
        .nest("/api/v1/health", health_routes)
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/auth/me", me_routes)
        .nest("/api/v1/projects", api(projects::routes(state.clone())))
        .nest("/api/v1/projects/{project_id}", api(project_scoped))
        .nest("/api/v1/projects/{project_id}/tasks", api(tasks::routes(state.clone())))
        .nest(
            "/api/v1/projects/{project_id}/tasks/{task_id}/files",
            file_routes,
        )
        .nest("/api/v1/projects/{project_id}/risks", api(risks::routes(state.clone())))
        .nest("/api/v1/invitations", api(invitations::routes(state.clone())))
        .nest("/api/v1/notifications", api(notifications::routes(state.clone())))
        .nest("/api/v1/activity", api(activity::routes(state)))
        .fallback(middleware::handle_404)
        .layer(CompressionLayer::new())
        .layer(middleware::cors(allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    app: CoreApp,
    services: ApiServices,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let services = ApiServices {
            database: app.database.clone(),
            cache: app.cache.clone(),
            auth_manager: app.auth.clone(),
            notifier: app.notifier.clone(),
            files: app.files.clone(),
        };
        let allowed_origins = AllowedOrigins::new(
            &app.config.server.host,
            app.config.server.port,
            &app.config.cors.origins,
        );

        Self {
            app,
            services,
            allowed_origins,
        }
    }

    /// Serve until shutdown; returns the app for cleanup
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            services,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();
        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(
            host.parse()
                .with_context(|| format!("Invalid server host: {}", host))?,
            port,
        );

        let router = build_router(&services, &app.config.rate_limit, &allowed_origins);

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::debug!(%addr, "HTTP server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}
