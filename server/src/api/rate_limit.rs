//! Rate limiting middleware for API routes

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::data::cache::{RateLimitBucket, RateLimitResult, RateLimiter};

/// Rate limit middleware state
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub bucket: RateLimitBucket,
    pub key_extractor: KeyExtractor,
}

/// How to extract rate limit key from request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExtractor {
    /// Per client IP (X-Forwarded-For first hop, else peer address)
    IpAddress,
    /// One shared counter for the whole bucket
    Global,
}

/// Rate limit exceeded response
pub struct RateLimitExceeded(RateLimitResult);

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let r = &self.0;
        let retry_after = r.retry_after.unwrap_or(60);
        let body = serde_json::json!({
            "error": "too_many_requests",
            "code": "RATE_LIMITED",
            "message": format!("Rate limit exceeded, retry in {} seconds", retry_after),
        });

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        set_rate_limit_headers(headers, r);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        response
    }
}

fn set_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(result.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(result.reset_at));
}

/// Extract rate limit key based on configuration
fn extract_key(request: &Request, key_extractor: KeyExtractor) -> String {
    match key_extractor {
        KeyExtractor::Global => "global".to_string(),
        KeyExtractor::IpAddress => request
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Rate limiting middleware function
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let key = extract_key(&request, state.key_extractor);
    let result = state.limiter.check(&state.bucket, &key);

    if !result.allowed {
        tracing::debug!(bucket = state.bucket.name, %key, "Rate limit exceeded");
        return Err(RateLimitExceeded(result));
    }

    let mut response = next.run(request).await;
    set_rate_limit_headers(response.headers_mut(), &result);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    use crate::core::config::CacheConfig;
    use crate::data::cache::CacheService;

    fn limited_router(rpm: u32) -> Router {
        let cache = Arc::new(CacheService::new(&CacheConfig { max_entries: 100 }));
        let state = RateLimitState {
            limiter: Arc::new(RateLimiter::new(cache)),
            bucket: RateLimitBucket {
                name: "test",
                requests_per_window: rpm,
                window_secs: 60,
                burst: 0,
            },
            key_extractor: KeyExtractor::IpAddress,
        };
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                state,
                rate_limit_middleware,
            ))
    }

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_blocks_after_limit_with_headers() {
        let app = limited_router(2);

        for remaining in ["1", "0"] {
            let response = app.clone().oneshot(request_from("10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["X-RateLimit-Remaining"], remaining);
        }

        let response = app.clone().oneshot(request_from("10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(response.headers()["X-RateLimit-Limit"], "2");

        // Separate key per client
        let response = app.oneshot(request_from("10.0.0.2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_extract_key_global() {
        let request = request_from("10.0.0.1");
        assert_eq!(extract_key(&request, KeyExtractor::Global), "global");
        assert_eq!(extract_key(&request, KeyExtractor::IpAddress), "10.0.0.1");
    }
}
