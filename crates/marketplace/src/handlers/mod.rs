pub mod error;
pub mod health;
pub mod listings;
pub mod users;

use axum::{extract::rejection::JsonRejection, Json};
use serde::Serialize;

pub use error::AppError;

/// Body returned by mutations that have no data to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn success() -> Json<MessageResponse> {
    Json(MessageResponse { message: "Success" })
}

/// Unwraps a JSON body, mapping extractor rejections to `400` responses.
pub fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Err(AppError::bad_request("Missing body")),
        Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
    }
}
