//! Functional core for the marketplace backend.
//!
//! Pure domain types, request validation, storage traits and the step plans
//! used to keep denormalized indexes in sync. Nothing in this crate performs I/O.

pub mod marketplace;
pub mod serde;
pub mod storage;
pub mod workflow;
