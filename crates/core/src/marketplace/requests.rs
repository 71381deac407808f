//! API request types for marketplace operations.
//!
//! Every field is optional at the deserialization layer so that a missing
//! field produces a `Missing <field>` validation error instead of a generic
//! JSON rejection. Following the Functional Core pattern, validation is pure.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::operations::dedupe_preserving_order;
use super::types::{Listing, ListingKey, ListingToRate, NewListing, ProfileField, User};
use crate::serde::{deserialize_optional_creation_time, deserialize_optional_string};

/// Highest rating a user can give.
pub const MAX_RATING: f64 = 5.0;

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::Missing(field))
}

/// Profile data supplied by the identity provider for the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// Request payload identifying a single listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingKeyRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
    pub creation_time: Option<String>,
}

impl ListingKeyRequest {
    pub fn validate(self) -> Result<ListingKey, ValidationError> {
        let listing_id = required(self.listing_id, "listingId")?;
        let creation_time = required(self.creation_time, "creationTime")?;
        Ok(ListingKey::new(listing_id, creation_time))
    }
}

/// Request payload for `POST /api/users/rate-user`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateUserRequest {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub to_rate_user_id: Option<String>,
}

impl RateUserRequest {
    /// Returns `(user_to_rate, rating)`.
    pub fn validate(self) -> Result<(String, f64), ValidationError> {
        let rating = self
            .rating
            .filter(|r| *r != 0.0)
            .ok_or(ValidationError::Missing("rating"))?;
        let user_id = required(self.to_rate_user_id, "toRateUserId")?;

        if !rating.is_finite() || rating < 0.0 || rating > MAX_RATING {
            return Err(ValidationError::Invalid {
                field: "rating",
                reason: "must be between 0 and 5",
            });
        }

        Ok((user_id, rating))
    }
}

/// Request payload for `PUT /api/users/update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub picture: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    /// Returns the present fields in the order they are applied.
    pub fn into_fields(self) -> Vec<(ProfileField, String)> {
        [
            (ProfileField::Phone, self.phone),
            (ProfileField::Picture, self.picture),
            (ProfileField::Name, self.name),
            (ProfileField::Email, self.email),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }
}

/// Request payload for `POST /api/users/signup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub custom_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub custom_email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub custom_picture: Option<String>,
}

impl SignupRequest {
    /// Builds the new profile. Custom values take precedence over the
    /// identity provider's.
    pub fn into_user(
        self,
        user_id: impl Into<String>,
        provider: ProviderProfile,
    ) -> Result<User, ValidationError> {
        let name = required(self.custom_name.or(provider.name), "name")?;
        let email = required(self.custom_email.or(provider.email), "email")?;
        let picture = required(self.custom_picture.or(provider.picture), "picture")?;

        let user = User::new(user_id, name, email, picture);
        Ok(match self.phone {
            Some(phone) => user.with_phone(phone),
            None => user,
        })
    }
}

/// Request payload for `POST /api/users/add-listing-to-rate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddListingToRateRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub buyer_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
    pub creation_time: Option<String>,
}

impl AddListingToRateRequest {
    /// Builds the entry stored on the buyer's profile; the caller is the seller.
    pub fn validate(self, seller_id: impl Into<String>) -> Result<ListingToRate, ValidationError> {
        let buyer_id = required(self.buyer_id, "buyerId")?;
        let listing_id = required(self.listing_id, "listingId")?;
        let creation_time = required(self.creation_time, "creationTime")?;

        Ok(ListingToRate {
            buyer_id,
            listing_id,
            creation_time,
            seller_id: seller_id.into(),
        })
    }
}

/// Request payload for `POST /api/users/make-listing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeListingRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
    pub creation_time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub pictures: Option<Vec<String>>,
}

impl MakeListingRequest {
    pub fn validate(self) -> Result<NewListing, ValidationError> {
        let listing_id = required(self.listing_id, "listingId")?;
        let creation_time = required(self.creation_time, "creationTime")?;
        let title = required(self.title, "title")?;
        let price = required(self.price, "price")?;
        let description = required(self.description, "description")?;
        let location = required(self.location, "location")?;
        let tags = required(self.tags, "tags")?;
        let pictures = required(self.pictures, "pictures")?;

        if !price.is_finite() || price < 0.0 {
            return Err(ValidationError::Invalid {
                field: "price",
                reason: "must be a non-negative number",
            });
        }

        Ok(NewListing {
            key: ListingKey::new(listing_id, creation_time),
            title,
            price,
            description,
            location,
            tags: validate_tags(tags)?,
            pictures,
        })
    }

    /// Validates and builds the listing owned by `owner`.
    pub fn into_listing(self, owner: impl Into<String>) -> Result<Listing, ValidationError> {
        self.validate().map(|new| Listing::new(new, owner))
    }
}

/// Tag names are trimmed, must be non-empty, and appear once per listing.
pub fn validate_tags(tags: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let tags: Vec<String> = tags.into_iter().map(|t| t.trim().to_string()).collect();
    if tags.iter().any(String::is_empty) {
        return Err(ValidationError::Invalid {
            field: "tags",
            reason: "tag names cannot be empty",
        });
    }
    Ok(dedupe_preserving_order(tags))
}

/// Request payload for `DELETE /api/users/delete-listing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteListingRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl DeleteListingRequest {
    pub fn validate(self) -> Result<(ListingKey, Vec<String>), ValidationError> {
        let listing_id = required(self.listing_id, "listingId")?;
        let creation_time = required(self.creation_time, "creationTime")?;
        let tags = required(self.tags, "tags")?;

        Ok((
            ListingKey::new(listing_id, creation_time),
            validate_tags(tags)?,
        ))
    }
}

/// Request payload for `PUT /api/listings/mark-sold`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSoldRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
    pub creation_time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub buyer_id: Option<String>,
}

impl MarkSoldRequest {
    pub fn validate(self) -> Result<(ListingKey, String), ValidationError> {
        let listing_id = required(self.listing_id, "listingId")?;
        let creation_time = required(self.creation_time, "creationTime")?;
        let buyer_id = required(self.buyer_id, "buyerId")?;
        Ok((ListingKey::new(listing_id, creation_time), buyer_id))
    }
}

/// Request payload for adding or removing a single tag on a listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingTagRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
    pub creation_time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub tag: Option<String>,
}

impl ListingTagRequest {
    pub fn validate(self) -> Result<(ListingKey, String), ValidationError> {
        let listing_id = required(self.listing_id, "listingId")?;
        let creation_time = required(self.creation_time, "creationTime")?;
        let tag = required(self.tag, "tag")?;
        Ok((
            ListingKey::new(listing_id, creation_time),
            tag.trim().to_string(),
        ))
    }
}

/// Request payload for adding or removing a single picture on a listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPictureRequest {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
    pub creation_time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub picture: Option<String>,
}

impl ListingPictureRequest {
    pub fn validate(self) -> Result<(ListingKey, String), ValidationError> {
        let listing_id = required(self.listing_id, "listingId")?;
        let creation_time = required(self.creation_time, "creationTime")?;
        let picture = required(self.picture, "picture")?;
        Ok((ListingKey::new(listing_id, creation_time), picture))
    }
}

/// Request payload for `POST /api/listings/batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchListingsRequest {
    #[serde(default)]
    pub listings: Option<Vec<ListingKeyRequest>>,
}

impl BatchListingsRequest {
    pub fn validate(self) -> Result<Vec<ListingKey>, ValidationError> {
        required(self.listings, "listings")?
            .into_iter()
            .map(ListingKeyRequest::validate)
            .collect()
    }
}
