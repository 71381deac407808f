use marketplace_core::storage::{
    ListingRepository, RepositoryError, TagRepository, UserRepository,
};
use marketplace_core::workflow::{OrchestrationError, Plan, Step, StepOutcome};

fn applied_if(changed: bool) -> StepOutcome {
    if changed {
        StepOutcome::Applied
    } else {
        StepOutcome::Unchanged
    }
}

/// Runs plans step by step against the repositories.
///
/// Execution stops at the first failing step. Completed steps stay applied;
/// the returned [`OrchestrationError`] lists them together with their
/// compensations. A step that halts on `Unchanged` ends the plan early with
/// success.
pub struct Orchestrator<'a> {
    users: &'a dyn UserRepository,
    listings: &'a dyn ListingRepository,
    tags: &'a dyn TagRepository,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        users: &'a dyn UserRepository,
        listings: &'a dyn ListingRepository,
        tags: &'a dyn TagRepository,
    ) -> Self {
        Self {
            users,
            listings,
            tags,
        }
    }

    pub async fn run(&self, plan: Plan) -> Result<Vec<StepOutcome>, OrchestrationError> {
        let Plan { operation, steps } = plan;
        let mut completed = Vec::with_capacity(steps.len());
        let mut outcomes = Vec::with_capacity(steps.len());

        for step in steps {
            match self.run_step(&step).await {
                Ok(outcome) => {
                    tracing::debug!(operation, step = %step, ?outcome, "Step finished");
                    outcomes.push(outcome);
                    let halt = outcome == StepOutcome::Unchanged && step.halts_when_unchanged();
                    completed.push(step);
                    if halt {
                        tracing::info!(operation, "Nothing to change, skipping remaining steps");
                        break;
                    }
                }
                Err(source) => {
                    return Err(OrchestrationError {
                        operation,
                        failed: step,
                        completed,
                        source,
                    });
                }
            }
        }

        tracing::info!(operation, steps = outcomes.len(), "Operation completed");
        Ok(outcomes)
    }

    async fn run_step(&self, step: &Step) -> Result<StepOutcome, RepositoryError> {
        let outcome = match step {
            Step::PutListing(listing) => {
                self.listings.create_listing(listing).await?;
                StepOutcome::Applied
            }
            Step::DeleteListing(key) => {
                self.listings.delete_listing(key).await?;
                StepOutcome::Applied
            }
            Step::AddActiveListing { user_id, listing } => {
                self.users.add_active_listing(user_id, listing).await?;
                StepOutcome::Applied
            }
            Step::RemoveActiveListing { user_id, listing } => {
                applied_if(self.users.remove_active_listing(user_id, listing).await?)
            }
            Step::EnsureTag(name) => match self.tags.create_tag(name).await {
                Ok(()) => StepOutcome::Applied,
                Err(RepositoryError::AlreadyExists { .. }) => StepOutcome::Unchanged,
                Err(e) => return Err(e),
            },
            Step::DeleteTagIfEmpty(name) => {
                applied_if(self.tags.delete_tag_if_empty(name).await?)
            }
            Step::AddTagReference { tag, listing } => {
                self.tags.add_listing(tag, listing).await?;
                StepOutcome::Applied
            }
            Step::RemoveTagReference { tag, listing } => {
                applied_if(self.tags.remove_listing(tag, listing).await?)
            }
            Step::AddSavedListing { user_id, listing } => {
                applied_if(self.users.add_saved_listing(user_id, listing).await?)
            }
            Step::RemoveSavedListing { user_id, listing } => {
                applied_if(self.users.remove_saved_listing(user_id, listing).await?)
            }
            Step::IncrementSavedCount(key) => {
                self.listings.increment_saved_count(key).await?;
                StepOutcome::Applied
            }
            // A deleted listing has no counter left to maintain.
            Step::DecrementSavedCount(key) => {
                match self.listings.decrement_saved_count(key).await {
                    Ok(()) => StepOutcome::Applied,
                    Err(RepositoryError::NotFound { .. }) => StepOutcome::Unchanged,
                    Err(e) => return Err(e),
                }
            }
            Step::AddListingTag { listing, tag } => {
                self.listings.add_tag(listing, tag).await?;
                StepOutcome::Applied
            }
            Step::RemoveListingTag { listing, tag } => {
                applied_if(self.listings.remove_tag(listing, tag).await?)
            }
        };
        Ok(outcome)
    }
}
