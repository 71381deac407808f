//! Axum extractor for RequestContext.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use super::types::{CallerIdentity, RequestContext, RequestId};
use crate::handlers::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_PICTURE_HEADER: &str = "x-user-picture";

fn extract_request_id(headers: &HeaderMap) -> RequestId {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(RequestId::from_uuid)
        .unwrap_or_else(RequestId::new)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_caller(headers: &HeaderMap) -> Option<CallerIdentity> {
    Some(CallerIdentity {
        user_id: header_value(headers, USER_ID_HEADER)?,
        name: header_value(headers, USER_NAME_HEADER),
        email: header_value(headers, USER_EMAIL_HEADER),
        picture: header_value(headers, USER_PICTURE_HEADER),
    })
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = extract_request_id(&parts.headers);
        let caller = extract_caller(&parts.headers).ok_or_else(|| {
            tracing::debug!(%request_id, "Request without caller identity");
            AppError::unauthorized()
        })?;

        Ok(RequestContext { caller, request_id })
    }
}
