//! In-memory storage backend.
//!
//! Stores users, listings and tags in maps wrapped in `Arc<RwLock<_>>`.
//! Listings live in a `BTreeMap` keyed by `(listingId, creationTime)` so scans
//! come back in a stable order and continuation tokens stay valid across pages.
//!
//! ```rust,ignore
//! use marketplace::storage::inmemory::InMemoryRepository;
//!
//! let repo = InMemoryRepository::new();
//! repo.fail_operation("add_listing"); // TagRepository::add_listing now fails
//! ```

mod repository;

pub use repository::InMemoryRepository;
