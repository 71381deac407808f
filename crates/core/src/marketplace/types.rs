use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::operations::normalize_search_text;

/// Composite key of a listing, also used as a by-value reference from
/// users and tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingKey {
    pub listing_id: String,
    #[serde(deserialize_with = "crate::serde::deserialize_creation_time")]
    pub creation_time: String,
}

impl ListingKey {
    pub fn new(listing_id: impl Into<String>, creation_time: impl Into<String>) -> Self {
        Self {
            listing_id: listing_id.into(),
            creation_time: creation_time.into(),
        }
    }
}

impl std::fmt::Display for ListingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.listing_id, self.creation_time)
    }
}

/// A sold listing the buyer still has to rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingToRate {
    pub buyer_id: String,
    pub listing_id: String,
    #[serde(deserialize_with = "crate::serde::deserialize_creation_time")]
    pub creation_time: String,
    pub seller_id: String,
}

impl ListingToRate {
    /// Returns true if this entry refers to the given listing.
    pub fn refers_to(&self, key: &ListingKey) -> bool {
        self.listing_id == key.listing_id && self.creation_time == key.creation_time
    }
}

/// Aggregate of all ratings a user has received.
///
/// Stored as a running total and a count so that adding a rating is a single
/// atomic increment of both values. The exposed rating is their mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Rating {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub count: u64,
}

impl Rating {
    /// Returns the mean rating, or 0 when nobody has rated yet.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    /// Returns the aggregate after adding one rating.
    pub fn with_rating(self, rating: f64) -> Self {
        Self {
            total: self.total + rating,
            count: self.count + 1,
        }
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Rating", 3)?;
        state.serialize_field("average", &self.average())?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field("count", &self.count)?;
        state.end()
    }
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub name: String,
    /// Lowercased name used for case-insensitive search.
    pub search_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub picture: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub saved_listings: Vec<ListingKey>,
    #[serde(default)]
    pub active_listings: Vec<ListingKey>,
    #[serde(default)]
    pub listings_to_rate: Vec<ListingToRate>,
}

impl User {
    /// Creates a fresh profile with no ratings and empty listing lists.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        picture: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            user_id: user_id.into(),
            search_name: normalize_search_text(&name),
            name,
            email: email.into(),
            phone: None,
            picture: picture.into(),
            rating: Rating::default(),
            saved_listings: Vec::new(),
            active_listings: Vec::new(),
            listings_to_rate: Vec::new(),
        }
    }

    /// Sets the phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Applies a single profile field, keeping `search_name` in sync with `name`.
    pub fn apply_field(&mut self, field: ProfileField, value: &str) {
        match field {
            ProfileField::Phone => self.phone = Some(value.to_string()),
            ProfileField::Picture => self.picture = value.to_string(),
            ProfileField::Name => {
                self.name = value.to_string();
                self.search_name = normalize_search_text(value);
            }
            ProfileField::Email => self.email = value.to_string(),
        }
    }
}

/// Profile fields that can be updated independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Phone,
    Picture,
    Name,
    Email,
}

impl ProfileField {
    /// Name of the stored attribute.
    pub fn attribute(&self) -> &'static str {
        match self {
            ProfileField::Phone => "phone",
            ProfileField::Picture => "picture",
            ProfileField::Name => "name",
            ProfileField::Email => "email",
        }
    }
}

/// A comment left on a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user_id: String,
    pub content: String,
    pub creation_time: String,
}

/// An item offered for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub listing_id: String,
    pub creation_time: String,
    /// Owner of the listing.
    pub user_id: String,
    pub title: String,
    /// Always `normalize_search_text(title)`.
    pub search_title: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    pub tags: Vec<String>,
    pub pictures: Vec<String>,
    pub sold: bool,
    pub sold_to: Option<String>,
    pub saved_count: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Listing {
    /// Builds a fresh, unsold listing owned by `owner`.
    pub fn new(new: NewListing, owner: impl Into<String>) -> Self {
        Self {
            listing_id: new.key.listing_id,
            creation_time: new.key.creation_time,
            user_id: owner.into(),
            search_title: normalize_search_text(&new.title),
            title: new.title,
            price: new.price,
            description: new.description,
            location: new.location,
            tags: new.tags,
            pictures: new.pictures,
            sold: false,
            sold_to: None,
            saved_count: 0,
            comments: Vec::new(),
        }
    }

    /// Returns the composite key of this listing.
    pub fn key(&self) -> ListingKey {
        ListingKey::new(&self.listing_id, &self.creation_time)
    }

    /// Returns true if `user_id` owns this listing.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Validated data for a listing that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub key: ListingKey,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    pub tags: Vec<String>,
    pub pictures: Vec<String>,
}

/// A tag and the listings that currently carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub listings: Vec<ListingKey>,
}

impl Tag {
    /// Creates a tag with no references.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listings: Vec::new(),
        }
    }

    /// Returns true if no listing references this tag.
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}
