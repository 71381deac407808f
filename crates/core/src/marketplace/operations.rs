use super::types::{Listing, User};

/// Normalizes text for case-insensitive substring search.
pub fn normalize_search_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Returns true if the listing title contains the normalized search term.
pub fn listing_matches_search(listing: &Listing, term: &str) -> bool {
    listing.search_title.contains(&normalize_search_text(term))
}

/// Returns true if the user's name contains the normalized query.
pub fn user_matches_name(user: &User, name: &str) -> bool {
    user.search_name.contains(&normalize_search_text(name))
}

/// Finds the position of the first element equal to `value`.
///
/// Removal by value is a positional removal at this index, so the result is
/// only meaningful for the snapshot it was computed from.
pub fn find_first_index<T: PartialEq>(items: &[T], value: &T) -> Option<usize> {
    items.iter().position(|item| item == value)
}

/// Drops duplicate entries while keeping first-seen order.
pub fn dedupe_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
