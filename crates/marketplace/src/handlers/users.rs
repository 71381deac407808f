//! User profile handlers (`/api/users`).
//!
//! Single-record mutations call one repository method. Listing creation,
//! deletion and save/unsave run step plans through the orchestrator.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;

use marketplace_core::marketplace::{
    AddListingToRateRequest, DeleteListingRequest, ListingKeyRequest, MakeListingRequest,
    RateUserRequest, SignupRequest, UpdateProfileRequest, User, ValidationError,
};
use marketplace_core::workflow::{
    create_listing_plan, delete_listing_plan, save_listing_plan, unsave_listing_plan,
};

use super::{parse_body, success, AppError, MessageResponse};
use crate::{context::RequestContext, state::AppState};

type MessageResult = Result<Json<MessageResponse>, AppError>;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn require_user(state: &AppState, user_id: &str) -> Result<User, AppError> {
    state
        .users
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User Not Found."))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    pub target_user_id: Option<String>,
}

/// Get a profile (GET /api/users/profile).
///
/// Returns the caller's profile unless `targetUserId` names another user.
pub async fn get_profile(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<User>, AppError> {
    let user_id = non_empty(query.target_user_id).unwrap_or_else(|| ctx.user_id().to_string());
    require_user(&state, &user_id).await.map(Json)
}

/// Rate another user (POST /api/users/rate-user).
pub async fn rate_user(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<RateUserRequest>, JsonRejection>,
) -> MessageResult {
    let (rated_user, rating) = parse_body(body)?.validate()?;

    state.users.add_rating(&rated_user, rating).await?;

    tracing::info!(request_id = %ctx.request_id, rater = ctx.user_id(), %rated_user, rating, "Rated user");
    Ok(success())
}

#[derive(Debug, Deserialize)]
pub struct SearchUsersQuery {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Search users by name substring or exact email (GET /api/users/search).
///
/// `name` wins when both are given.
pub async fn search_users(
    _ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<SearchUsersQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    if let Some(name) = non_empty(query.name) {
        return Ok(Json(state.users.search_users_by_name(&name).await?));
    }
    if let Some(email) = non_empty(query.email) {
        return Ok(Json(state.users.search_users_by_email(&email).await?));
    }
    Err(ValidationError::MissingQuery.into())
}

/// Update profile fields (PUT /api/users/update).
///
/// Each present field is written with its own update, in the order phone,
/// picture, name, email. A failure leaves earlier fields written.
pub async fn update_profile(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> MessageResult {
    let fields = parse_body(body)?.into_fields();

    for (field, value) in &fields {
        state
            .users
            .update_profile_field(ctx.user_id(), *field, value)
            .await?;
        tracing::debug!(user_id = ctx.user_id(), field = field.attribute(), "Updated profile field");
    }

    Ok(success())
}

/// Create the caller's profile (POST /api/users/signup).
pub async fn signup(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> MessageResult {
    let user = parse_body(body)?.into_user(ctx.user_id(), ctx.provider_profile())?;

    state.users.create_user(&user).await?;

    tracing::info!(request_id = %ctx.request_id, user_id = %user.user_id, "Created profile");
    Ok(success())
}

/// Save a listing for the caller (POST /api/users/save-listing).
pub async fn save_listing(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<ListingKeyRequest>, JsonRejection>,
) -> MessageResult {
    let key = parse_body(body)?.validate()?;

    if state.listings.get_listing(&key).await?.is_none() {
        return Err(AppError::not_found("Listing Not Found."));
    }

    state
        .orchestrator()
        .run(save_listing_plan(ctx.user_id(), &key))
        .await?;

    Ok(success())
}

/// Remove a listing from the caller's saved list (DELETE /api/users/unsave-listing).
pub async fn unsave_listing(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<ListingKeyRequest>, JsonRejection>,
) -> MessageResult {
    let key = parse_body(body)?.validate()?;

    state
        .orchestrator()
        .run(unsave_listing_plan(ctx.user_id(), &key))
        .await?;

    Ok(success())
}

/// Ask a buyer to rate the caller for a listing (POST /api/users/add-listing-to-rate).
///
/// The entry is stored on the buyer's profile; the listing is not checked.
pub async fn add_listing_to_rate(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<AddListingToRateRequest>, JsonRejection>,
) -> MessageResult {
    let entry = parse_body(body)?.validate(ctx.user_id())?;

    state
        .users
        .add_listing_to_rate(&entry.buyer_id, &entry)
        .await?;

    Ok(success())
}

/// Drop an entry from the caller's listings to rate (DELETE /api/users/remove-listing-to-rate).
pub async fn remove_listing_to_rate(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<ListingKeyRequest>, JsonRejection>,
) -> MessageResult {
    let key = parse_body(body)?.validate()?;

    let removed = state
        .users
        .remove_listing_to_rate(ctx.user_id(), &key)
        .await?;
    tracing::debug!(user_id = ctx.user_id(), listing = %key, removed, "Removed listing to rate");

    Ok(success())
}

/// Create a listing owned by the caller (POST /api/users/make-listing).
pub async fn make_listing(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<MakeListingRequest>, JsonRejection>,
) -> MessageResult {
    let listing = parse_body(body)?.into_listing(ctx.user_id())?;

    require_user(&state, ctx.user_id()).await?;

    state
        .orchestrator()
        .run(create_listing_plan(&listing))
        .await?;

    tracing::info!(
        request_id = %ctx.request_id,
        listing = %listing.key(),
        title = %listing.title,
        "Created listing"
    );
    Ok(success())
}

/// Delete one of the caller's listings (DELETE /api/users/delete-listing).
///
/// Tag cleanup uses the tags from the request. A listing that is already gone
/// still has its references cleaned up.
pub async fn delete_listing(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<DeleteListingRequest>, JsonRejection>,
) -> MessageResult {
    let (key, tags) = parse_body(body)?.validate()?;

    if let Some(existing) = state.listings.get_listing(&key).await? {
        if !existing.is_owned_by(ctx.user_id()) {
            return Err(AppError::forbidden());
        }
    }

    state
        .orchestrator()
        .run(delete_listing_plan(ctx.user_id(), &key, &tags))
        .await?;

    tracing::info!(request_id = %ctx.request_id, listing = %key, "Deleted listing");
    Ok(success())
}
