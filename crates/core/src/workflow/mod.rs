//! Multi-record operations as explicit, ordered step plans.
//!
//! The store offers no multi-key transactions. Operations that keep
//! denormalized data in sync (tag index, saved counts, per-user listing
//! lists) are plans of single-record steps, executed in order by the server.

mod error;
mod plans;
mod steps;

pub use error::OrchestrationError;
pub use plans::{
    add_listing_tag_plan, create_listing_plan, delete_listing_plan, remove_listing_tag_plan,
    save_listing_plan, unsave_listing_plan, Plan,
};
pub use steps::{Step, StepOutcome};
