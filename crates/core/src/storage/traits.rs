use async_trait::async_trait;

use crate::marketplace::{Listing, ListingKey, ListingToRate, ProfileField, Tag, User};

use super::{Page, PageRequest, Result};

/// Repository for user profiles.
///
/// Every mutation targets a single field of a single user record, so
/// concurrent updates to different fields never clobber each other.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Gets a user by their ID.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Creates a new user. Fails with `AlreadyExists` if the ID is taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Finds users whose name contains `name`, ignoring case.
    async fn search_users_by_name(&self, name: &str) -> Result<Vec<User>>;

    /// Finds users with exactly this email address.
    async fn search_users_by_email(&self, email: &str) -> Result<Vec<User>>;

    /// Overwrites one profile field.
    async fn update_profile_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
    ) -> Result<()>;

    /// Adds one rating to the user's aggregate.
    async fn add_rating(&self, user_id: &str, rating: f64) -> Result<()>;

    /// Adds a saved listing. Returns false if it was already saved.
    async fn add_saved_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool>;

    /// Removes a saved listing. Returns false if it was not saved.
    async fn remove_saved_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool>;

    /// Appends to the user's active listings.
    async fn add_active_listing(&self, user_id: &str, listing: &ListingKey) -> Result<()>;

    /// Removes from the user's active listings. Returns false if absent.
    async fn remove_active_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool>;

    /// Appends to the user's listings to rate.
    async fn add_listing_to_rate(&self, user_id: &str, entry: &ListingToRate) -> Result<()>;

    /// Removes the first listing to rate that refers to `listing`.
    async fn remove_listing_to_rate(&self, user_id: &str, listing: &ListingKey) -> Result<bool>;
}

/// Repository for listings.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Creates a new listing. Fails with `AlreadyExists` if the key is taken.
    async fn create_listing(&self, listing: &Listing) -> Result<()>;

    /// Scans one page of listings.
    async fn list_listings(&self, page: PageRequest) -> Result<Page<Listing>>;

    /// Gets several listings at once. Missing keys are skipped and the
    /// result order is unspecified.
    async fn get_listings_by_keys(&self, keys: &[ListingKey]) -> Result<Vec<Listing>>;

    /// Gets a listing by its key.
    async fn get_listing(&self, key: &ListingKey) -> Result<Option<Listing>>;

    /// Finds listings whose title contains `term`, ignoring case.
    async fn search_listings(&self, term: &str) -> Result<Vec<Listing>>;

    /// Sets `sold` and `soldTo` together.
    async fn mark_sold(&self, key: &ListingKey, buyer_id: &str) -> Result<()>;

    /// Atomically adds 1 to `savedCount`.
    async fn increment_saved_count(&self, key: &ListingKey) -> Result<()>;

    /// Atomically subtracts 1 from `savedCount`, never going below zero.
    async fn decrement_saved_count(&self, key: &ListingKey) -> Result<()>;

    async fn add_tag(&self, key: &ListingKey, tag: &str) -> Result<()>;

    /// Removes the first occurrence of `tag`. Returns false if absent.
    async fn remove_tag(&self, key: &ListingKey, tag: &str) -> Result<bool>;

    async fn add_picture(&self, key: &ListingKey, picture: &str) -> Result<()>;

    /// Removes the first occurrence of `picture`. Returns false if absent.
    async fn remove_picture(&self, key: &ListingKey, picture: &str) -> Result<bool>;

    /// Deletes a listing. Deleting a missing listing succeeds.
    async fn delete_listing(&self, key: &ListingKey) -> Result<()>;
}

/// Repository for the tag → listing index.
///
/// Keeping a tag record alive exactly while it has references is the
/// caller's job; each method touches one record and nothing else.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Gets a tag by name.
    async fn get_tag(&self, name: &str) -> Result<Option<Tag>>;

    /// Creates a tag with no references. Fails with `AlreadyExists` if present.
    async fn create_tag(&self, name: &str) -> Result<()>;

    /// Appends a listing reference. Fails with `NotFound` if the tag is missing.
    async fn add_listing(&self, name: &str, listing: &ListingKey) -> Result<()>;

    /// Removes the first matching reference. Returns false if the tag or the
    /// reference is absent.
    async fn remove_listing(&self, name: &str, listing: &ListingKey) -> Result<bool>;

    /// Deletes the tag record only if it references no listing. Returns false
    /// if the tag is missing or still referenced when the delete lands.
    async fn delete_tag_if_empty(&self, name: &str) -> Result<bool>;
}
