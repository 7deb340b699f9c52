//! Error types for club-api
//!
//! Handlers return `ApiResult<T>`. Every error is logged once when it is
//! turned into a response and rendered as `{"error": "...", "details": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation failed (400)
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Option<Value>,
    },

    /// State conflict (409), e.g. a ticket that was already scanned
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<Value>,
    },

    /// A third-party service (payments, storage, renderer) failed (502)
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Common(#[from] club_common::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    fn status_and_body(self) -> (StatusCode, String, Option<Value>) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what), None),
            ApiError::BadRequest { message, details } => (StatusCode::BAD_REQUEST, message, details),
            ApiError::Conflict { message, details } => (StatusCode::CONFLICT, message, details),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            ApiError::Database(err) => database_error(err),
            ApiError::Common(err) => match err {
                club_common::Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg, None),
                club_common::Error::Database(err) => database_error(err),
                other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string(), None),
            },
            ApiError::Other(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None),
        }
    }
}

/// Constraint violations are caused by the request, everything else is ours
fn database_error(err: sqlx::Error) -> (StatusCode, String, Option<Value>) {
    if let sqlx::Error::RowNotFound = err {
        return (StatusCode::NOT_FOUND, "Record not found".to_string(), None);
    }

    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return (
                StatusCode::BAD_REQUEST,
                "A record with the same unique value already exists".to_string(),
                Some(json!({ "constraint": db_err.message() })),
            );
        }
        if db_err.is_check_violation() || db_err.is_foreign_key_violation() {
            return (
                StatusCode::BAD_REQUEST,
                "Request violates a data constraint".to_string(),
                Some(json!({ "constraint": db_err.message() })),
            );
        }
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Database error: {}", err),
        None,
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = self.status_and_body();

        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", message);
        } else {
            warn!(status = status.as_u16(), "{}", message);
        }

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Reject blank required string fields
pub fn require_text(value: Option<&str>, field: &str) -> ApiResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::bad_request(format!("Missing required field: {}", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::not_found("Event"), StatusCode::NOT_FOUND),
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::Common(club_common::Error::InvalidInput("x".into())),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text(Some("  Derby "), "title").unwrap(), "Derby");
        assert!(require_text(Some("   "), "title").is_err());
        assert!(require_text(None, "title").is_err());
    }
}
