//! Listing handlers (`/api/listings`).

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;

use marketplace_core::marketplace::{
    BatchListingsRequest, Listing, ListingKey, ListingKeyRequest, ListingPictureRequest,
    ListingTagRequest, MarkSoldRequest, ValidationError,
};
use marketplace_core::storage::{ContinuationToken, Page, PageRequest};
use marketplace_core::workflow::{add_listing_tag_plan, remove_listing_tag_plan};

use super::{parse_body, success, AppError, MessageResponse};
use crate::{context::RequestContext, state::AppState};

type MessageResult = Result<Json<MessageResponse>, AppError>;

/// Loads a listing the caller is allowed to modify.
async fn owned_listing(
    state: &AppState,
    ctx: &RequestContext,
    key: &ListingKey,
) -> Result<Listing, AppError> {
    let listing = state
        .listings
        .get_listing(key)
        .await?
        .ok_or_else(|| AppError::not_found("Listing Not Found."))?;

    if !listing.is_owned_by(ctx.user_id()) {
        tracing::warn!(request_id = %ctx.request_id, user_id = ctx.user_id(), listing = %key, "Caller does not own listing");
        return Err(AppError::forbidden());
    }
    Ok(listing)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListListingsQuery {
    pub limit: Option<u32>,
    pub start_key: Option<String>,
}

/// Page through all listings (GET /api/listings).
pub async fn list_listings(
    _ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<ListListingsQuery>,
) -> Result<Json<Page<Listing>>, AppError> {
    let limit = state.config.page_size(query.limit);
    let start = query
        .start_key
        .filter(|s| !s.is_empty())
        .map(ContinuationToken::new);

    let page = state
        .listings
        .list_listings(PageRequest::new(start, Some(limit)))
        .await?;

    Ok(Json(page))
}

/// Get one listing (GET /api/listings/listing?listingId=&creationTime=).
pub async fn get_listing(
    _ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<ListingKeyRequest>,
) -> Result<Json<Listing>, AppError> {
    let key = query.validate()?;

    state
        .listings
        .get_listing(&key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Listing Not Found."))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListingsQuery {
    pub search_term: Option<String>,
}

/// Search listings by title (GET /api/listings/search?searchTerm=).
pub async fn search_listings(
    _ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<SearchListingsQuery>,
) -> Result<Json<Vec<Listing>>, AppError> {
    let term = query
        .search_term
        .filter(|t| !t.trim().is_empty())
        .ok_or(ValidationError::MissingQuery)?;

    Ok(Json(state.listings.search_listings(&term).await?))
}

/// Fetch several listings at once (POST /api/listings/batch).
///
/// Missing listings are skipped; the result order is not guaranteed.
pub async fn batch_get_listings(
    _ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<BatchListingsRequest>, JsonRejection>,
) -> Result<Json<Vec<Listing>>, AppError> {
    let keys = parse_body(body)?.validate()?;

    if keys.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.listings.get_listings_by_keys(&keys).await?))
}

/// Mark one of the caller's listings as sold (PUT /api/listings/mark-sold).
pub async fn mark_sold(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<MarkSoldRequest>, JsonRejection>,
) -> MessageResult {
    let (key, buyer_id) = parse_body(body)?.validate()?;
    owned_listing(&state, &ctx, &key).await?;

    state.listings.mark_sold(&key, &buyer_id).await?;

    tracing::info!(request_id = %ctx.request_id, listing = %key, %buyer_id, "Marked listing sold");
    Ok(success())
}

/// Tag one of the caller's listings (POST /api/listings/add-tag).
pub async fn add_tag(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<ListingTagRequest>, JsonRejection>,
) -> MessageResult {
    let (key, tag) = parse_body(body)?.validate()?;
    let listing = owned_listing(&state, &ctx, &key).await?;

    if listing.tags.contains(&tag) {
        tracing::debug!(listing = %key, %tag, "Listing already tagged");
        return Ok(success());
    }

    state
        .orchestrator()
        .run(add_listing_tag_plan(&key, &tag))
        .await?;

    Ok(success())
}

/// Untag one of the caller's listings (DELETE /api/listings/remove-tag).
pub async fn remove_tag(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<ListingTagRequest>, JsonRejection>,
) -> MessageResult {
    let (key, tag) = parse_body(body)?.validate()?;
    owned_listing(&state, &ctx, &key).await?;

    state
        .orchestrator()
        .run(remove_listing_tag_plan(&key, &tag))
        .await?;

    Ok(success())
}

/// Append a picture to one of the caller's listings (POST /api/listings/add-picture).
pub async fn add_picture(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<ListingPictureRequest>, JsonRejection>,
) -> MessageResult {
    let (key, picture) = parse_body(body)?.validate()?;
    owned_listing(&state, &ctx, &key).await?;

    state.listings.add_picture(&key, &picture).await?;

    Ok(success())
}

/// Remove a picture from one of the caller's listings (DELETE /api/listings/remove-picture).
pub async fn remove_picture(
    ctx: RequestContext,
    State(state): State<AppState>,
    body: Result<Json<ListingPictureRequest>, JsonRejection>,
) -> MessageResult {
    let (key, picture) = parse_body(body)?.validate()?;
    owned_listing(&state, &ctx, &key).await?;

    let removed = state.listings.remove_picture(&key, &picture).await?;
    tracing::debug!(listing = %key, removed, "Removed picture");

    Ok(success())
}
