//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and domain types.
//! These are testable in isolation without DynamoDB access.

use std::collections::HashMap;
use std::str::FromStr;

use aws_sdk_dynamodb::types::AttributeValue;
use marketplace_core::marketplace::{Comment, Listing, ListingKey, ListingToRate, Rating, Tag, User};
use marketplace_core::storage::RepositoryError;

pub type Item = HashMap<String, AttributeValue>;

// ============================================================================
// Attribute names
// ============================================================================

pub const USER_ID: &str = "userId";
pub const LISTING_ID: &str = "listingId";
pub const CREATION_TIME: &str = "creationTime";
pub const TAG_NAME: &str = "name";

pub const SAVED_LISTINGS: &str = "savedListings";
pub const ACTIVE_LISTINGS: &str = "activeListings";
pub const LISTINGS_TO_RATE: &str = "listingsToRate";
pub const RATING_TOTAL: &str = "ratingTotal";
pub const RATING_COUNT: &str = "ratingCount";
pub const SEARCH_NAME: &str = "searchName";
pub const SEARCH_TITLE: &str = "searchTitle";
pub const SAVED_COUNT: &str = "savedCount";
pub const TAGS: &str = "tags";
pub const PICTURES: &str = "pictures";
pub const TAG_LISTINGS: &str = "listings";

// ============================================================================
// Keys
// ============================================================================

pub fn user_key(user_id: &str) -> Item {
    HashMap::from([(USER_ID.to_string(), AttributeValue::S(user_id.to_string()))])
}

pub fn listing_key(key: &ListingKey) -> Item {
    HashMap::from([
        (LISTING_ID.to_string(), AttributeValue::S(key.listing_id.clone())),
        (
            CREATION_TIME.to_string(),
            AttributeValue::S(key.creation_time.clone()),
        ),
    ])
}

pub fn tag_key(name: &str) -> Item {
    HashMap::from([(TAG_NAME.to_string(), AttributeValue::S(name.to_string()))])
}

/// Reads the listing key back out of a primary key or a full item.
pub fn item_to_listing_key(item: &Item) -> Result<ListingKey, RepositoryError> {
    Ok(ListingKey::new(
        get_string(item, LISTING_ID)?,
        get_string(item, CREATION_TIME)?,
    ))
}

// ============================================================================
// List element conversions
// ============================================================================

/// A `(listingId, creationTime)` reference as stored inside list attributes.
pub fn listing_ref_to_value(key: &ListingKey) -> AttributeValue {
    AttributeValue::M(listing_key(key))
}

fn value_to_listing_ref(value: &AttributeValue) -> Result<ListingKey, RepositoryError> {
    let map = value
        .as_m()
        .map_err(|_| RepositoryError::InvalidData("listing reference is not a map".into()))?;
    item_to_listing_key(map)
}

pub fn listing_to_rate_to_value(entry: &ListingToRate) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        ("buyerId".to_string(), AttributeValue::S(entry.buyer_id.clone())),
        (LISTING_ID.to_string(), AttributeValue::S(entry.listing_id.clone())),
        (
            CREATION_TIME.to_string(),
            AttributeValue::S(entry.creation_time.clone()),
        ),
        ("sellerId".to_string(), AttributeValue::S(entry.seller_id.clone())),
    ]))
}

fn value_to_listing_to_rate(value: &AttributeValue) -> Result<ListingToRate, RepositoryError> {
    let map = value
        .as_m()
        .map_err(|_| RepositoryError::InvalidData("listing to rate is not a map".into()))?;
    Ok(ListingToRate {
        buyer_id: get_string(map, "buyerId")?,
        listing_id: get_string(map, LISTING_ID)?,
        creation_time: get_string(map, CREATION_TIME)?,
        seller_id: get_string(map, "sellerId")?,
    })
}

fn comment_to_value(comment: &Comment) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        (USER_ID.to_string(), AttributeValue::S(comment.user_id.clone())),
        ("content".to_string(), AttributeValue::S(comment.content.clone())),
        (
            CREATION_TIME.to_string(),
            AttributeValue::S(comment.creation_time.clone()),
        ),
    ]))
}

fn value_to_comment(value: &AttributeValue) -> Result<Comment, RepositoryError> {
    let map = value
        .as_m()
        .map_err(|_| RepositoryError::InvalidData("comment is not a map".into()))?;
    Ok(Comment {
        user_id: get_string(map, USER_ID)?,
        content: get_string(map, "content")?,
        creation_time: get_string(map, CREATION_TIME)?,
    })
}

fn strings_to_value(values: &[String]) -> AttributeValue {
    AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
}

// ============================================================================
// User conversions
// ============================================================================

/// Convert a User to DynamoDB item.
pub fn user_to_item(user: &User) -> Item {
    let mut item = user_key(&user.user_id);

    item.insert("name".to_string(), AttributeValue::S(user.name.clone()));
    item.insert(
        SEARCH_NAME.to_string(),
        AttributeValue::S(user.search_name.clone()),
    );
    item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
    if let Some(phone) = &user.phone {
        item.insert("phone".to_string(), AttributeValue::S(phone.clone()));
    }
    item.insert(
        "picture".to_string(),
        AttributeValue::S(user.picture.clone()),
    );
    item.insert(
        RATING_TOTAL.to_string(),
        AttributeValue::N(user.rating.total.to_string()),
    );
    item.insert(
        RATING_COUNT.to_string(),
        AttributeValue::N(user.rating.count.to_string()),
    );
    item.insert(
        SAVED_LISTINGS.to_string(),
        AttributeValue::L(user.saved_listings.iter().map(listing_ref_to_value).collect()),
    );
    item.insert(
        ACTIVE_LISTINGS.to_string(),
        AttributeValue::L(user.active_listings.iter().map(listing_ref_to_value).collect()),
    );
    item.insert(
        LISTINGS_TO_RATE.to_string(),
        AttributeValue::L(
            user.listings_to_rate
                .iter()
                .map(listing_to_rate_to_value)
                .collect(),
        ),
    );

    item
}

/// Convert a DynamoDB item to User.
///
/// Aggregates and lists missing from older records read as empty.
pub fn item_to_user(item: &Item) -> Result<User, RepositoryError> {
    let name = get_string(item, "name")?;
    Ok(User {
        user_id: get_string(item, USER_ID)?,
        search_name: get_optional_string(item, SEARCH_NAME).unwrap_or_else(|| name.to_lowercase()),
        name,
        email: get_string(item, "email")?,
        phone: get_optional_string(item, "phone"),
        picture: get_optional_string(item, "picture").unwrap_or_default(),
        rating: Rating {
            total: get_optional_number(item, RATING_TOTAL)?.unwrap_or(0.0),
            count: get_optional_number(item, RATING_COUNT)?.unwrap_or(0),
        },
        saved_listings: get_list(item, SAVED_LISTINGS, value_to_listing_ref)?,
        active_listings: get_list(item, ACTIVE_LISTINGS, value_to_listing_ref)?,
        listings_to_rate: get_list(item, LISTINGS_TO_RATE, value_to_listing_to_rate)?,
    })
}

// ============================================================================
// Listing conversions
// ============================================================================

/// Convert a Listing to DynamoDB item.
pub fn listing_to_item(listing: &Listing) -> Item {
    let mut item = listing_key(&listing.key());

    item.insert(USER_ID.to_string(), AttributeValue::S(listing.user_id.clone()));
    item.insert("title".to_string(), AttributeValue::S(listing.title.clone()));
    item.insert(
        SEARCH_TITLE.to_string(),
        AttributeValue::S(listing.search_title.clone()),
    );
    item.insert(
        "price".to_string(),
        AttributeValue::N(listing.price.to_string()),
    );
    item.insert(
        "description".to_string(),
        AttributeValue::S(listing.description.clone()),
    );
    item.insert(
        "location".to_string(),
        AttributeValue::S(listing.location.clone()),
    );
    item.insert(TAGS.to_string(), strings_to_value(&listing.tags));
    item.insert(PICTURES.to_string(), strings_to_value(&listing.pictures));
    item.insert("sold".to_string(), AttributeValue::Bool(listing.sold));
    item.insert(
        "soldTo".to_string(),
        match &listing.sold_to {
            Some(buyer) => AttributeValue::S(buyer.clone()),
            None => AttributeValue::Null(true),
        },
    );
    item.insert(
        SAVED_COUNT.to_string(),
        AttributeValue::N(listing.saved_count.to_string()),
    );
    item.insert(
        "comments".to_string(),
        AttributeValue::L(listing.comments.iter().map(comment_to_value).collect()),
    );

    item
}

/// Convert a DynamoDB item to Listing.
pub fn item_to_listing(item: &Item) -> Result<Listing, RepositoryError> {
    let title = get_string(item, "title")?;
    Ok(Listing {
        listing_id: get_string(item, LISTING_ID)?,
        creation_time: get_string(item, CREATION_TIME)?,
        user_id: get_string(item, USER_ID)?,
        search_title: get_optional_string(item, SEARCH_TITLE)
            .unwrap_or_else(|| title.trim().to_lowercase()),
        title,
        price: get_optional_number(item, "price")?.unwrap_or(0.0),
        description: get_optional_string(item, "description").unwrap_or_default(),
        location: get_optional_string(item, "location").unwrap_or_default(),
        tags: get_list(item, TAGS, value_to_string)?,
        pictures: get_list(item, PICTURES, value_to_string)?,
        sold: item
            .get("sold")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        sold_to: get_optional_string(item, "soldTo"),
        saved_count: get_optional_number(item, SAVED_COUNT)?.unwrap_or(0),
        comments: get_list(item, "comments", value_to_comment)?,
    })
}

// ============================================================================
// Tag conversions
// ============================================================================

/// A freshly created tag with no references.
pub fn new_tag_item(name: &str) -> Item {
    let mut item = tag_key(name);
    item.insert(TAG_LISTINGS.to_string(), AttributeValue::L(Vec::new()));
    item
}

/// Convert a DynamoDB item to Tag.
pub fn item_to_tag(item: &Item) -> Result<Tag, RepositoryError> {
    Ok(Tag {
        name: get_string(item, TAG_NAME)?,
        listings: get_list(item, TAG_LISTINGS, value_to_listing_ref)?,
    })
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get a required string attribute.
fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

/// Get an optional string attribute. `NULL` reads as absent.
fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

/// Get an optional numeric attribute.
fn get_optional_number<T: FromStr>(item: &Item, key: &str) -> Result<Option<T>, RepositoryError> {
    match item.get(key).and_then(|v| v.as_n().ok()) {
        Some(n) => n
            .parse()
            .map(Some)
            .map_err(|_| RepositoryError::InvalidData(format!("Invalid number {}: {}", key, n))),
        None => Ok(None),
    }
}

fn value_to_string(value: &AttributeValue) -> Result<String, RepositoryError> {
    value
        .as_s()
        .map(|s| s.to_string())
        .map_err(|_| RepositoryError::InvalidData("list element is not a string".into()))
}

/// Get a list attribute, converting each element. A missing list is empty.
fn get_list<T>(
    item: &Item,
    key: &str,
    convert: impl Fn(&AttributeValue) -> Result<T, RepositoryError>,
) -> Result<Vec<T>, RepositoryError> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(Vec::new()),
        Some(AttributeValue::L(values)) => values.iter().map(convert).collect(),
        Some(_) => Err(RepositoryError::InvalidData(format!(
            "Field {} is not a list",
            key
        ))),
    }
}
