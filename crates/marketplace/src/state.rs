//! Application state with repository-based storage.
//!
//! The state holds one trait object per collection. Both backends implement
//! all three traits on a single repository value, which is shared behind the
//! three `Arc`s.

use std::sync::Arc;

use marketplace_core::storage::{ListingRepository, TagRepository, UserRepository};

use crate::config::Config;
use crate::orchestration::Orchestrator;

/// Shared application state, cloned for each request handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub listings: Arc<dyn ListingRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state from a repository implementing every collection trait.
    pub fn new<R>(repository: R, config: Config) -> Self
    where
        R: UserRepository + ListingRepository + TagRepository + 'static,
    {
        let repository = Arc::new(repository);
        Self {
            users: repository.clone(),
            listings: repository.clone(),
            tags: repository,
            config: Arc::new(config),
        }
    }

    /// In-memory state, used by tests and local development.
    #[cfg(feature = "inmemory")]
    pub fn in_memory(config: Config) -> Self {
        Self::new(crate::storage::InMemoryRepository::new(), config)
    }

    /// DynamoDB-backed state using the default AWS credential chain.
    #[cfg(feature = "dynamodb")]
    pub async fn dynamodb(config: Config) -> Self {
        let repository = crate::storage::DynamoDbRepository::from_config(&config).await;
        Self::new(repository, config)
    }

    /// Executor for multi-record operations over this state's repositories.
    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(
            self.users.as_ref(),
            self.listings.as_ref(),
            self.tags.as_ref(),
        )
    }
}
