//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `RepositoryError` from `marketplace_core::storage`.
//! Classification goes by the service error code, so one mapping serves every
//! operation. What a failed condition means depends on the call, so each
//! helper names it.

use std::error::Error;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use marketplace_core::storage::RepositoryError;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";
const THROTTLING_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "ThrottlingException",
];

/// Classifies a service error code. `on_condition_failed` is used for
/// `ConditionalCheckFailedException`.
fn error_for_code(
    code: Option<&str>,
    message: String,
    on_condition_failed: impl FnOnce() -> RepositoryError,
) -> RepositoryError {
    match code {
        Some(CONDITIONAL_CHECK_FAILED) => on_condition_failed(),
        Some(code) if THROTTLING_CODES.contains(&code) => RepositoryError::Throttled {
            code: code.to_string(),
        },
        code => RepositoryError::QueryFailed {
            message,
            code: code.map(str::to_string),
        },
    }
}

fn map_sdk_error<E, R>(
    err: SdkError<E, R>,
    operation: &'static str,
    on_condition_failed: impl FnOnce() -> RepositoryError,
) -> RepositoryError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: Debug,
{
    let detail = DisplayErrorContext(&err).to_string();
    if matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)
    ) {
        return RepositoryError::ConnectionFailed(format!("{operation}: {detail}"));
    }

    let message = format!(
        "{operation} failed: {}",
        err.message().unwrap_or(detail.as_str())
    );
    error_for_code(err.code(), message, on_condition_failed)
}

/// Map an error from an unconditional read or write.
pub fn map_read_error<E, R>(err: SdkError<E, R>, operation: &'static str) -> RepositoryError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: Debug,
{
    map_sdk_error(err, operation, || {
        RepositoryError::query_failed(format!("{operation}: unexpected condition failure"))
    })
}

/// Map an error from a put guarded by `attribute_not_exists`.
pub fn map_create_error<E, R>(
    err: SdkError<E, R>,
    operation: &'static str,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: Debug,
{
    map_sdk_error(err, operation, || RepositoryError::AlreadyExists {
        entity_type,
        id: id.into(),
    })
}

/// Map an error from an update guarded by `attribute_exists`.
pub fn map_update_error<E, R>(
    err: SdkError<E, R>,
    operation: &'static str,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: Debug,
{
    map_sdk_error(err, operation, || RepositoryError::NotFound {
        entity_type,
        id: id.into(),
    })
}

/// Map an error from an update guarded by a value read earlier.
pub fn map_guarded_update_error<E, R>(
    err: SdkError<E, R>,
    operation: &'static str,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: Debug,
{
    map_sdk_error(err, operation, || RepositoryError::Conflict {
        entity_type,
        id: id.into(),
    })
}
