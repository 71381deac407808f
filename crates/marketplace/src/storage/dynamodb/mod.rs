//! DynamoDB storage backend.
//!
//! Users, listings and tags live in separate tables. Each repository method
//! touches a single item, so multi-record operations are sequenced by the
//! orchestrator rather than wrapped in transactions.
//!
//! Table names and an optional local endpoint come from [`Config`](crate::config::Config):
//!
//! ```bash
//! USERS_TABLE=users LISTINGS_TABLE=listings TAGS_TABLE=tags \
//!   DYNAMODB_ENDPOINT=http://localhost:8000 \
//!   cargo run -p marketplace --no-default-features --features dynamodb
//! ```

mod conversions;
mod error;
mod repository;

pub use repository::DynamoDbRepository;
