mod error;
mod operations;
mod requests;
mod types;

pub use error::ValidationError;
pub use operations::{
    dedupe_preserving_order, find_first_index, listing_matches_search, normalize_search_text,
    user_matches_name,
};
pub use requests::{
    validate_tags, AddListingToRateRequest, BatchListingsRequest, DeleteListingRequest,
    ListingKeyRequest, ListingPictureRequest, ListingTagRequest, MakeListingRequest,
    MarkSoldRequest, ProviderProfile, RateUserRequest, SignupRequest, UpdateProfileRequest,
    MAX_RATING,
};
pub use types::{
    Comment, Listing, ListingKey, ListingToRate, NewListing, ProfileField, Rating, Tag, User,
};
