//! Path and validation extractors for API routes
//!
//! Malformed input (unparseable path, query or JSON) is a 400. Input that
//! parses but fails `validator` constraints is a 422 with per-field messages.

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::api::types::{ApiError, FieldErrors};

/// Maximum length for path IDs
pub const MAX_ID_LENGTH: usize = 64;

/// Validate an entity ID: 1-64 chars, alphanumeric + dash/underscore
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validation rejection with structured error response
pub enum ValidationRejection {
    /// Failed to parse path parameters
    Path(PathRejection),
    /// Path ID with an invalid format
    InvalidId(&'static str),
    /// Failed to parse query string
    Query(QueryRejection),
    /// Failed to parse JSON body
    Json(JsonRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Path(rejection) => ApiError::bad_request("PATH_PARSE_ERROR", rejection.body_text()),
            Self::InvalidId(name) => ApiError::bad_request(
                "INVALID_ID",
                format!("Invalid {name}: must be 1-64 alphanumeric chars, dashes, or underscores"),
            ),
            Self::Query(rejection) => {
                ApiError::bad_request("QUERY_PARSE_ERROR", rejection.body_text())
            }
            Self::Json(rejection) => ApiError::bad_request("JSON_PARSE_ERROR", rejection.body_text()),
            Self::Validation(errors) => {
                let fields = field_errors(&errors);
                ApiError::unprocessable("VALIDATION_ERROR", summarize(&fields), fields)
            }
        };
        err.into_response()
    }
}

/// Flatten `validator` errors to `{field: [message, ...]}`
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{}: validation failed", field))
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .values()
        .flatten()
        .cloned()
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query extractor with automatic validation.
///
/// Deserializes query parameters and validates them using the `validator` crate.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

/// JSON body extractor with automatic validation.
///
/// Deserializes JSON body and validates it using the `validator` crate.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationRejection::Json)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Validate)]
    struct Body {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
        #[validate(range(min = 0, max = 100, message = "Must be 0-100"))]
        pct: i64,
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("ckx9f2q0000abc"));
        assert!(is_valid_id("a-b_c"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id(&"a".repeat(65)));
    }

    #[test]
    fn test_field_errors_collects_each_field() {
        let body = Body {
            name: String::new(),
            pct: 150,
        };
        let errors = body.validate().unwrap_err();
        let fields = field_errors(&errors);
        assert_eq!(fields["name"], vec!["Name is required"]);
        assert_eq!(fields["pct"], vec!["Must be 0-100"]);
        assert!(summarize(&fields).contains("Name is required"));
    }
}
