use std::fmt;

use crate::marketplace::{Listing, ListingKey};

/// A single store operation inside a multi-record sequence.
///
/// Each step touches exactly one record and carries everything needed to
/// execute it. Steps that report `Unchanged` when already applied can be
/// repeated on their own; rerunning a whole plan after a failure is a
/// different matter, see [`Step::halts_when_unchanged`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    PutListing(Box<Listing>),
    DeleteListing(ListingKey),
    AddActiveListing { user_id: String, listing: ListingKey },
    RemoveActiveListing { user_id: String, listing: ListingKey },
    /// Creates the tag record unless it already exists.
    EnsureTag(String),
    /// Deletes the tag record if it no longer references any listing.
    DeleteTagIfEmpty(String),
    AddTagReference { tag: String, listing: ListingKey },
    RemoveTagReference { tag: String, listing: ListingKey },
    AddSavedListing { user_id: String, listing: ListingKey },
    RemoveSavedListing { user_id: String, listing: ListingKey },
    IncrementSavedCount(ListingKey),
    DecrementSavedCount(ListingKey),
    AddListingTag { listing: ListingKey, tag: String },
    RemoveListingTag { listing: ListingKey, tag: String },
}

/// What executing a step did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// The record was already in the requested state.
    Unchanged,
}

impl Step {
    /// Short identifier used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Step::PutListing(_) => "put_listing",
            Step::DeleteListing(_) => "delete_listing",
            Step::AddActiveListing { .. } => "add_active_listing",
            Step::RemoveActiveListing { .. } => "remove_active_listing",
            Step::EnsureTag(_) => "ensure_tag",
            Step::DeleteTagIfEmpty(_) => "delete_tag_if_empty",
            Step::AddTagReference { .. } => "add_tag_reference",
            Step::RemoveTagReference { .. } => "remove_tag_reference",
            Step::AddSavedListing { .. } => "add_saved_listing",
            Step::RemoveSavedListing { .. } => "remove_saved_listing",
            Step::IncrementSavedCount(_) => "increment_saved_count",
            Step::DecrementSavedCount(_) => "decrement_saved_count",
            Step::AddListingTag { .. } => "add_listing_tag",
            Step::RemoveListingTag { .. } => "remove_listing_tag",
        }
    }

    /// The step that undoes this one, if it can be undone from the step alone.
    ///
    /// Deleting a listing has no inverse: the deleted record is not carried.
    pub fn compensation(&self) -> Option<Step> {
        let inverse = match self {
            Step::PutListing(listing) => Step::DeleteListing(listing.key()),
            Step::DeleteListing(_) => return None,
            Step::AddActiveListing { user_id, listing } => Step::RemoveActiveListing {
                user_id: user_id.clone(),
                listing: listing.clone(),
            },
            Step::RemoveActiveListing { user_id, listing } => Step::AddActiveListing {
                user_id: user_id.clone(),
                listing: listing.clone(),
            },
            Step::EnsureTag(tag) => Step::DeleteTagIfEmpty(tag.clone()),
            Step::DeleteTagIfEmpty(tag) => Step::EnsureTag(tag.clone()),
            Step::AddTagReference { tag, listing } => Step::RemoveTagReference {
                tag: tag.clone(),
                listing: listing.clone(),
            },
            Step::RemoveTagReference { tag, listing } => Step::AddTagReference {
                tag: tag.clone(),
                listing: listing.clone(),
            },
            Step::AddSavedListing { user_id, listing } => Step::RemoveSavedListing {
                user_id: user_id.clone(),
                listing: listing.clone(),
            },
            Step::RemoveSavedListing { user_id, listing } => Step::AddSavedListing {
                user_id: user_id.clone(),
                listing: listing.clone(),
            },
            Step::IncrementSavedCount(key) => Step::DecrementSavedCount(key.clone()),
            Step::DecrementSavedCount(key) => Step::IncrementSavedCount(key.clone()),
            Step::AddListingTag { listing, tag } => Step::RemoveListingTag {
                listing: listing.clone(),
                tag: tag.clone(),
            },
            Step::RemoveListingTag { listing, tag } => Step::AddListingTag {
                listing: listing.clone(),
                tag: tag.clone(),
            },
        };
        Some(inverse)
    }

    /// Returns true if an `Unchanged` outcome means the remaining steps have
    /// nothing left to reconcile.
    ///
    /// A save of an already-saved listing must not bump the counter again.
    /// The halt trusts that the counter step ran when the list step did: if a
    /// save fails between the two, retrying it halts on the saved list and
    /// `savedCount` stays one short until it is corrected out of band.
    pub fn halts_when_unchanged(&self) -> bool {
        matches!(
            self,
            Step::AddSavedListing { .. } | Step::RemoveSavedListing { .. }
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::PutListing(listing) => write!(f, "{}({})", self.name(), listing.key()),
            Step::DeleteListing(key)
            | Step::IncrementSavedCount(key)
            | Step::DecrementSavedCount(key) => write!(f, "{}({key})", self.name()),
            Step::AddActiveListing { user_id, listing }
            | Step::RemoveActiveListing { user_id, listing }
            | Step::AddSavedListing { user_id, listing }
            | Step::RemoveSavedListing { user_id, listing } => {
                write!(f, "{}({user_id}, {listing})", self.name())
            }
            Step::EnsureTag(tag) | Step::DeleteTagIfEmpty(tag) => {
                write!(f, "{}({tag})", self.name())
            }
            Step::AddTagReference { tag, listing }
            | Step::RemoveTagReference { tag, listing }
            | Step::AddListingTag { listing, tag }
            | Step::RemoveListingTag { listing, tag } => {
                write!(f, "{}({tag}, {listing})", self.name())
            }
        }
    }
}
