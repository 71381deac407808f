use thiserror::Error;

use crate::storage::RepositoryError;

use super::steps::Step;

/// A multi-record operation stopped partway.
///
/// Nothing is rolled back. The error records which steps already hit the
/// store and what would undo them, so the torn state can be logged and
/// repaired.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{operation} failed at {failed}: {source}")]
pub struct OrchestrationError {
    pub operation: &'static str,
    pub failed: Step,
    pub completed: Vec<Step>,
    pub source: RepositoryError,
}

impl OrchestrationError {
    /// Steps that would undo the completed ones, most recent first.
    pub fn compensations(&self) -> Vec<Step> {
        self.completed
            .iter()
            .rev()
            .filter_map(Step::compensation)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::ListingKey;

    #[test]
    fn test_compensations_reverse_completed_steps() {
        let key = ListingKey::new("L1", "1000");
        let error = OrchestrationError {
            operation: "create_listing",
            failed: Step::AddTagReference {
                tag: "a".to_string(),
                listing: key.clone(),
            },
            completed: vec![
                Step::AddActiveListing {
                    user_id: "u1".to_string(),
                    listing: key.clone(),
                },
                Step::EnsureTag("a".to_string()),
            ],
            source: RepositoryError::ConnectionFailed("timeout".to_string()),
        };

        assert_eq!(
            error.compensations(),
            vec![
                Step::DeleteTagIfEmpty("a".to_string()),
                Step::RemoveActiveListing {
                    user_id: "u1".to_string(),
                    listing: key,
                },
            ]
        );
    }

    #[test]
    fn test_display_names_failed_step() {
        let error = OrchestrationError {
            operation: "unsave_listing",
            failed: Step::DecrementSavedCount(ListingKey::new("L1", "1")),
            completed: vec![],
            source: RepositoryError::ConnectionFailed("down".to_string()),
        };

        assert_eq!(
            error.to_string(),
            "unsave_listing failed at decrement_saved_count(L1@1): Connection failed: down"
        );
    }
}
