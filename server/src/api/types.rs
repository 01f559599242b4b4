//! Shared API types
//!
//! Common types used across all API endpoints: the error type and its
//! mapping from data, domain and file-service errors, plus pagination.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::ValidationError;

use crate::data::files::error::FileServiceError;
use crate::domain::DomainError;

/// Maximum items per page for paginated endpoints
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Maximum page number to prevent expensive OFFSET queries
pub const MAX_PAGE: u32 = 1000;
/// Default page number
pub const DEFAULT_PAGE: u32 = 1;
/// Default items per page
pub const DEFAULT_LIMIT: u32 = 20;

/// Per-field validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Validator function for page parameter
pub fn validate_page(page: u32) -> Result<(), ValidationError> {
    if page < 1 {
        return Err(ValidationError::new("page_min").with_message("Page must be >= 1".into()));
    }
    if page > MAX_PAGE {
        return Err(ValidationError::new("page_max")
            .with_message(format!("Page must be <= {}", MAX_PAGE).into()));
    }
    Ok(())
}

/// Validator function for limit parameter
pub fn validate_limit(limit: u32) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::new("limit_range")
            .with_message(format!("Limit must be between 1 and {}", MAX_PAGE_LIMIT).into()));
    }
    Ok(())
}

/// Validator function for `YYYY-MM-DD` date fields
pub fn validate_date(value: &str) -> Result<(), ValidationError> {
    if crate::utils::time::parse_date(value).is_none() {
        return Err(ValidationError::new("date_format")
            .with_message("Date must be in YYYY-MM-DD format".into()));
    }
    Ok(())
}

/// Validator for required text that is stored trimmed
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Must not be blank".into()));
    }
    Ok(())
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        code: String,
        message: String,
    },
    Unauthorized {
        code: String,
        message: String,
    },
    Forbidden {
        code: String,
        message: String,
    },
    NotFound {
        code: String,
        message: String,
    },
    Conflict {
        code: String,
        message: String,
    },
    /// Validation or business-rule failure, reported per field
    Unprocessable {
        code: String,
        message: String,
        fields: FieldErrors,
    },
    ServiceUnavailable {
        message: String,
    },
    Internal {
        message: String,
    },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unprocessable(
        code: impl Into<String>,
        message: impl Into<String>,
        fields: FieldErrors,
    ) -> Self {
        Self::Unprocessable {
            code: code.into(),
            message: message.into(),
            fields,
        }
    }

    /// 422 with a single message against one field
    pub fn field(code: impl Into<String>, field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        Self::unprocessable(code, message, fields)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn from_data(e: crate::data::DataError) -> Self {
        match e {
            crate::data::DataError::Conflict(message) => Self::conflict("CONFLICT", message),
            e if e.is_transient() => {
                tracing::warn!(error = %e, "Database temporarily unavailable");
                Self::service_unavailable("Database temporarily unavailable")
            }
            e => {
                tracing::error!(error = %e, "Data error");
                Self::Internal {
                    message: "Database operation failed".to_string(),
                }
            }
        }
    }

    pub fn from_domain(e: DomainError) -> Self {
        Self::field(e.code(), e.field(), e.to_string())
    }

    pub fn from_file(e: FileServiceError) -> Self {
        match e {
            FileServiceError::NotFound => Self::not_found("FILE_NOT_FOUND", "File not found"),
            FileServiceError::Empty => Self::field("FILE_EMPTY", "file", "File is empty"),
            FileServiceError::TooLarge { .. } => Self::field("FILE_TOO_LARGE", "file", e.to_string()),
            FileServiceError::UnsupportedType { .. } => {
                Self::field("UNSUPPORTED_FILE_TYPE", "file", e.to_string())
            }
            FileServiceError::Database(e) => Self::from_data(e),
            FileServiceError::Storage(e) => {
                tracing::error!(error = %e, "File storage error");
                Self::internal("File storage operation failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message, fields) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message, None)
            }
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", code, message, None)
            }
            Self::Forbidden { code, message } => {
                (StatusCode::FORBIDDEN, "forbidden", code, message, None)
            }
            Self::NotFound { code, message } => {
                (StatusCode::NOT_FOUND, "not_found", code, message, None)
            }
            Self::Conflict { code, message } => {
                (StatusCode::CONFLICT, "conflict", code, message, None)
            }
            Self::Unprocessable {
                code,
                message,
                fields,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable_entity",
                code,
                message,
                Some(fields),
            ),
            Self::ServiceUnavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "SERVICE_UNAVAILABLE".to_string(),
                message,
                None,
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
                None,
            ),
        };

        let mut body = serde_json::json!({
            "error": error_type,
            "code": code,
            "message": message
        });
        if let Some(fields) = fields {
            body["fields"] = serde_json::json!(fields);
        }
        (status, Json(body)).into_response()
    }
}

/// Deserialize a nullable field of a partial update.
///
/// Absent stays `None`, explicit `null` becomes `Some(None)` and clears the
/// column. Pair with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// `end` must not precede `start` when both are set
pub fn check_date_range(
    start: Option<&str>,
    end: Option<&str>,
    end_field: &str,
) -> Result<(), ApiError> {
    if let (Some(start), Some(end)) = (start, end)
        && end < start
    {
        return Err(ApiError::field(
            "INVALID_DATE_RANGE",
            end_field,
            "End date must not be before the start date",
        ));
    }
    Ok(())
}

/// Validate a date that arrives outside the derive (partial updates)
pub fn check_date(field: &str, value: Option<&str>) -> Result<(), ApiError> {
    match value {
        Some(v) if validate_date(v).is_err() => Err(ApiError::field(
            "VALIDATION_ERROR",
            field,
            "Date must be in YYYY-MM-DD format",
        )),
        _ => Ok(()),
    }
}

/// Unix seconds to a UTC timestamp for response DTOs
pub fn datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

pub fn default_page() -> u32 {
    DEFAULT_PAGE
}

pub fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Pagination metadata in response
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            page,
            limit,
            total_items,
            total_pages: total_items.div_ceil(u64::from(limit.max(1))),
        }
    }
}

/// Generic paginated response wrapper
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta::new(page, limit, total_items),
        }
    }
}

/// Unwrapped list response (non-paginated collections)
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_domain_error_is_422_with_field() {
        let err = ApiError::from_domain(DomainError::BudgetExceeded {
            amount_cents: 500,
            remaining_cents: 100,
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUDGET_EXCEEDED");
        assert!(body["fields"]["amount_cents"][0].as_str().is_some());
    }

    #[tokio::test]
    async fn test_conflict_maps_to_409() {
        let err = ApiError::from_data(crate::data::DataError::Conflict("taken".into()));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "taken");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_file_errors() {
        let (status, body) = body_json(ApiError::from_file(FileServiceError::TooLarge {
            size: 10,
            max: 5,
        }))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "FILE_TOO_LARGE");
        assert!(body["fields"]["file"].is_array());

        let (status, _) = body_json(ApiError::from_file(FileServiceError::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(2, 20, 41);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(PaginationMeta::new(1, 20, 0).total_pages, 0);
    }

    #[test]
    fn test_double_option() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            note: Option<Option<String>>,
        }
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);
        let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));
        let set: Patch = serde_json::from_str(r#"{"note": "x"}"#).unwrap();
        assert_eq!(set.note, Some(Some("x".to_string())));
    }

    #[test]
    fn test_date_range() {
        assert!(check_date_range(Some("2026-01-01"), Some("2026-01-01"), "end_date").is_ok());
        assert!(check_date_range(None, Some("2026-01-01"), "end_date").is_ok());
        assert!(matches!(
            check_date_range(Some("2026-02-01"), Some("2026-01-01"), "end_date"),
            Err(ApiError::Unprocessable { .. })
        ));
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2026-02-28").is_ok());
        assert!(validate_date("2026-02-30").is_err());
        assert!(validate_date("28/02/2026").is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank(" Launch ").is_ok());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("\t\n").is_err());
    }
}
