use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} was modified concurrently: {id}")]
    Conflict {
        entity_type: &'static str,
        id: String,
    },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request throttled ({code}), please retry")]
    Throttled { code: String },
    #[error("Query failed: {message}")]
    QueryFailed {
        message: String,
        code: Option<String>,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Creates a `QueryFailed` error without an upstream error code.
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
            code: None,
        }
    }

    /// Returns the upstream store error code, when the store supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            RepositoryError::Throttled { code } => Some(code),
            RepositoryError::QueryFailed { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
