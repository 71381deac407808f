use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use marketplace_core::marketplace::ValidationError;
use marketplace_core::storage::{repository_error_to_status_code, RepositoryError};
use marketplace_core::workflow::OrchestrationError;

/// Error returned by every handler.
///
/// Rendered as `{"message": ..., "code": ...}` with the mapped status. The
/// `code` is the upstream store error code, when there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, code = ?self.code, "API error");
        } else {
            tracing::warn!(status = %self.status, message = %self.message, "API error");
        }

        let body = ErrorBody {
            message: &self.message,
            code: self.code.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        let status = StatusCode::from_u16(repository_error_to_status_code(&err))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            code: err.code().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<OrchestrationError> for AppError {
    fn from(err: OrchestrationError) -> Self {
        let completed: Vec<String> = err.completed.iter().map(ToString::to_string).collect();
        let compensations: Vec<String> =
            err.compensations().iter().map(ToString::to_string).collect();
        tracing::warn!(
            operation = err.operation,
            failed = %err.failed,
            ?completed,
            ?compensations,
            "Multi-record operation stopped partway"
        );
        Self::from(err.source)
    }
}
