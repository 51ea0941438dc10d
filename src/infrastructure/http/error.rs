//! HTTP Error Handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Conflict(String),
    /// provider 重试耗尽，客户端可以稍后重试
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn errno(&self) -> i32 {
        match self {
            ApiError::NotFound(_) => errno::NOT_FOUND,
            ApiError::BadRequest(_) => errno::BAD_REQUEST,
            ApiError::Internal(_) => errno::INTERNAL_ERROR,
            ApiError::Conflict(_) => errno::CONFLICT,
            ApiError::ServiceUnavailable(_) => errno::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Internal(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let errno = self.errno();
        let msg = self.message();
        match &self {
            ApiError::NotFound(_) => tracing::warn!(errno = errno, error = %msg, "Resource not found"),
            ApiError::BadRequest(_) => tracing::warn!(errno = errno, error = %msg, "Bad request"),
            ApiError::Conflict(_) => tracing::warn!(errno = errno, error = %msg, "Resource conflict"),
            ApiError::Internal(_) => {
                tracing::error!(errno = errno, error = %msg, "Internal server error")
            }
            ApiError::ServiceUnavailable(_) => {
                tracing::error!(errno = errno, error = %msg, "Service unavailable")
            }
        }

        (StatusCode::OK, Json(ErrorResponse::new(errno, msg))).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        let message = e.to_string();
        match e {
            ApplicationError::InvalidRequest(_) | ApplicationError::InvalidState(_) => {
                ApiError::BadRequest(message)
            }
            ApplicationError::Provider { .. } => ApiError::ServiceUnavailable(message),
            ApplicationError::JobNotFound(_)
            | ApplicationError::BookNotFound(_)
            | ApplicationError::NotFound { .. } => ApiError::NotFound(message),
            ApplicationError::ConcurrentJobConflict(_) => ApiError::Conflict(message),
            ApplicationError::CacheIo(_)
            | ApplicationError::RepositoryError(_)
            | ApplicationError::StorageError(_)
            | ApplicationError::InternalError(_) => ApiError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_error_mapping() {
        let cases = [
            (ApplicationError::invalid_request("empty"), errno::BAD_REQUEST),
            (
                ApplicationError::Provider {
                    attempts: 4,
                    message: "down".to_string(),
                },
                errno::SERVICE_UNAVAILABLE,
            ),
            (ApplicationError::JobNotFound("x".to_string()), errno::NOT_FOUND),
            (ApplicationError::not_found("Artifact", "abc"), errno::NOT_FOUND),
            (ApplicationError::ConcurrentJobConflict("x".to_string()), errno::CONFLICT),
            (ApplicationError::CacheIo("bad".to_string()), errno::INTERNAL_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).errno(), expected);
        }
    }
}
