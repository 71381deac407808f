//! Executes the step plans built by `marketplace_core::workflow`.
//!
//! The plans are pure data; this module is the imperative shell that runs
//! them against the repositories, one independent store call per step.

mod executor;

pub use executor::Orchestrator;
