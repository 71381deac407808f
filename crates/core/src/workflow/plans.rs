//! Step plans for operations that span more than one record.
//!
//! The order of the steps is part of the contract: it decides which
//! cross-record invariant is left broken if execution stops partway.

use crate::marketplace::{Listing, ListingKey};

use super::steps::Step;

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub operation: &'static str,
    pub steps: Vec<Step>,
}

/// Listing record first, then the owner's active list, then for each tag the
/// tag record (if missing) followed by the reference.
pub fn create_listing_plan(listing: &Listing) -> Plan {
    let key = listing.key();
    let mut steps = vec![
        Step::PutListing(Box::new(listing.clone())),
        Step::AddActiveListing {
            user_id: listing.user_id.clone(),
            listing: key.clone(),
        },
    ];
    for tag in &listing.tags {
        steps.push(Step::EnsureTag(tag.clone()));
        steps.push(Step::AddTagReference {
            tag: tag.clone(),
            listing: key.clone(),
        });
    }
    Plan {
        operation: "create_listing",
        steps,
    }
}

/// Mirror image of [`create_listing_plan`]: the listing goes first, then the
/// owner's reference, then each tag reference followed by the tag record once
/// it is empty.
pub fn delete_listing_plan(owner: &str, key: &ListingKey, tags: &[String]) -> Plan {
    let mut steps = vec![
        Step::DeleteListing(key.clone()),
        Step::RemoveActiveListing {
            user_id: owner.to_string(),
            listing: key.clone(),
        },
    ];
    for tag in tags {
        steps.push(Step::RemoveTagReference {
            tag: tag.clone(),
            listing: key.clone(),
        });
        steps.push(Step::DeleteTagIfEmpty(tag.clone()));
    }
    Plan {
        operation: "delete_listing",
        steps,
    }
}

pub fn save_listing_plan(user_id: &str, key: &ListingKey) -> Plan {
    Plan {
        operation: "save_listing",
        steps: vec![
            Step::AddSavedListing {
                user_id: user_id.to_string(),
                listing: key.clone(),
            },
            Step::IncrementSavedCount(key.clone()),
        ],
    }
}

pub fn unsave_listing_plan(user_id: &str, key: &ListingKey) -> Plan {
    Plan {
        operation: "unsave_listing",
        steps: vec![
            Step::RemoveSavedListing {
                user_id: user_id.to_string(),
                listing: key.clone(),
            },
            Step::DecrementSavedCount(key.clone()),
        ],
    }
}

pub fn add_listing_tag_plan(key: &ListingKey, tag: &str) -> Plan {
    Plan {
        operation: "add_listing_tag",
        steps: vec![
            Step::AddListingTag {
                listing: key.clone(),
                tag: tag.to_string(),
            },
            Step::EnsureTag(tag.to_string()),
            Step::AddTagReference {
                tag: tag.to_string(),
                listing: key.clone(),
            },
        ],
    }
}

pub fn remove_listing_tag_plan(key: &ListingKey, tag: &str) -> Plan {
    Plan {
        operation: "remove_listing_tag",
        steps: vec![
            Step::RemoveListingTag {
                listing: key.clone(),
                tag: tag.to_string(),
            },
            Step::RemoveTagReference {
                tag: tag.to_string(),
                listing: key.clone(),
            },
            Step::DeleteTagIfEmpty(tag.to_string()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::NewListing;

    fn listing_with_tags(tags: &[&str]) -> Listing {
        Listing::new(
            NewListing {
                key: ListingKey::new("L1", "1000"),
                title: "Sofa".to_string(),
                price: 50.0,
                description: "d".to_string(),
                location: "x".to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                pictures: vec![],
            },
            "owner",
        )
    }

    fn names(plan: &Plan) -> Vec<&'static str> {
        plan.steps.iter().map(Step::name).collect()
    }

    #[test]
    fn test_create_listing_plan_order() {
        let plan = create_listing_plan(&listing_with_tags(&["a", "b"]));

        assert_eq!(plan.operation, "create_listing");
        assert_eq!(
            names(&plan),
            vec![
                "put_listing",
                "add_active_listing",
                "ensure_tag",
                "add_tag_reference",
                "ensure_tag",
                "add_tag_reference",
            ]
        );
    }

    #[test]
    fn test_create_listing_plan_without_tags() {
        let plan = create_listing_plan(&listing_with_tags(&[]));

        assert_eq!(names(&plan), vec!["put_listing", "add_active_listing"]);
    }

    #[test]
    fn test_delete_listing_plan_order() {
        let key = ListingKey::new("L1", "1000");
        let plan = delete_listing_plan("owner", &key, &["a".to_string()]);

        assert_eq!(
            names(&plan),
            vec![
                "delete_listing",
                "remove_active_listing",
                "remove_tag_reference",
                "delete_tag_if_empty",
            ]
        );
        assert_eq!(
            plan.steps[1],
            Step::RemoveActiveListing {
                user_id: "owner".to_string(),
                listing: key,
            }
        );
    }

    #[test]
    fn test_save_and_unsave_are_inverse_sequences() {
        let key = ListingKey::new("L1", "1000");
        let save = save_listing_plan("u1", &key);
        let unsave = unsave_listing_plan("u1", &key);

        let inverted: Vec<Step> = save
            .steps
            .iter()
            .filter_map(Step::compensation)
            .collect();

        assert_eq!(inverted, unsave.steps);
    }

    #[test]
    fn test_tag_edit_plans() {
        let key = ListingKey::new("L1", "1000");

        assert_eq!(
            names(&add_listing_tag_plan(&key, "a")),
            vec!["add_listing_tag", "ensure_tag", "add_tag_reference"]
        );
        assert_eq!(
            names(&remove_listing_tag_plan(&key, "a")),
            vec![
                "remove_listing_tag",
                "remove_tag_reference",
                "delete_tag_if_empty"
            ]
        );
    }
}
