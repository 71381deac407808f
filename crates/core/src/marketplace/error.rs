use thiserror::Error;

/// Errors found while validating a request, before any store access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("Missing query params.")]
    MissingQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_display() {
        assert_eq!(ValidationError::Missing("name").to_string(), "Missing name");
    }

    #[test]
    fn test_invalid_display() {
        let error = ValidationError::Invalid {
            field: "rating",
            reason: "must be between 0 and 5",
        };
        assert_eq!(error.to_string(), "Invalid rating: must be between 0 and 5");
    }
}
