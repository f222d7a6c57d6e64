//! Error type shared by the stores and the HTTP handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use marketchat_proto::api::{ErrorBody, ErrorCode};

/// Errors returned by store operations and surfaced as JSON responses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The addressed product or room does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller may not perform this action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request body was rejected.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No valid bearer credential was presented.
    #[error("missing or unknown credential")]
    Unauthorized,
}

impl ApiError {
    /// Returns the wire error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Validation(_) => ErrorCode::Validation,
            Self::Unauthorized => ErrorCode::Unauthorized,
        }
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
