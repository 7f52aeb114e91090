// src/web/handlers/listing_handlers.rs
use crate::auth::AuthenticatedUser;
use crate::core::Database;
use crate::repository::SubleaseListingRepository;
use crate::types::{ListingFilter, ListingStatusUpdate, SubleaseListing, SubleaseListingInput};
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

async fn owned_listing(
    repo: &SubleaseListingRepository<'_>,
    id: i64,
    auth: &AuthenticatedUser,
    allow_admin: bool,
) -> ApiResult<SubleaseListing> {
    let listing = repo
        .find_by_id(id)
        .await
        .or_internal("Failed to load listing")?
        .ok_or_else(|| not_found("Listing"))?;

    let allowed = listing.owner_id == auth.id() || (allow_admin && auth.is_admin());
    if !allowed {
        return Err(forbidden("You can only change your own listings"));
    }
    Ok(listing)
}

pub async fn create_listing_handler(
    request: Json<StandardRequest<SubleaseListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<SubleaseListing>> {
    let conversation_id = request.conversation_id();
    if !auth.is_student() {
        return Err(with_conversation(student_required(), conversation_id));
    }

    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let listing = SubleaseListingRepository::new(db.pool())
        .create(auth.id(), &input)
        .await
        .or_internal("Failed to create listing")?;

    info!("User {} created sublease listing {}", auth.email(), listing.id);

    Ok(DataResponse::success(
        "Listing created".to_string(),
        listing,
        conversation_id,
    )
    .created())
}

pub async fn list_listings_handler(
    filter: ListingFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseListing>>>> {
    let filter = filter.parse().map_err(validation_error)?;

    let listings = SubleaseListingRepository::new(db.pool())
        .search(&filter)
        .await
        .or_internal("Failed to search listings")?;

    Ok(Json(DataResponse::success(
        format!("Found {} listings", listings.len()),
        listings.into(),
        None,
    )))
}

pub async fn get_listing_handler(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseListing>>> {
    let listing = SubleaseListingRepository::new(db.pool())
        .find_by_id(id)
        .await
        .or_internal("Failed to load listing")?
        .ok_or_else(|| not_found("Listing"))?;

    Ok(Json(DataResponse::success(
        "Listing found".to_string(),
        listing,
        None,
    )))
}

pub async fn update_listing_handler(
    id: i64,
    request: Json<StandardRequest<SubleaseListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseListing>>> {
    let conversation_id = request.conversation_id();
    let repo = SubleaseListingRepository::new(db.pool());
    owned_listing(&repo, id, &auth, false).await?;

    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let listing = repo
        .update(id, &input)
        .await
        .or_internal("Failed to update listing")?
        .ok_or_else(|| not_found("Listing"))?;

    info!("User {} updated sublease listing {}", auth.email(), id);

    Ok(Json(DataResponse::success(
        "Listing updated".to_string(),
        listing,
        conversation_id,
    )))
}

pub async fn set_listing_status_handler(
    id: i64,
    request: Json<StandardRequest<ListingStatusUpdate>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    let conversation_id = request.conversation_id();
    let repo = SubleaseListingRepository::new(db.pool());
    owned_listing(&repo, id, &auth, false).await?;

    let is_active = request.data.is_active;
    if !repo
        .set_active(id, is_active)
        .await
        .or_internal("Failed to update listing status")?
    {
        return Err(not_found("Listing"));
    }

    let (message, action) = if is_active {
        ("Listing is active again", "listing_relisted")
    } else {
        ("Listing marked as taken", "listing_taken")
    };
    info!("User {} set listing {} active={}", auth.email(), id, is_active);

    Ok(Json(ActionResponse::success(
        message.to_string(),
        action.to_string(),
        conversation_id,
    )))
}

pub async fn delete_listing_handler(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    let repo = SubleaseListingRepository::new(db.pool());
    owned_listing(&repo, id, &auth, true).await?;

    if !repo.delete(id).await.or_internal("Failed to delete listing")? {
        return Err(not_found("Listing"));
    }

    info!("User {} deleted sublease listing {}", auth.email(), id);

    Ok(Json(ActionResponse::success(
        format!("Listing {} deleted", id),
        "listing_deleted".to_string(),
        None,
    )))
}

pub async fn my_listings_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseListing>>>> {
    let listings = SubleaseListingRepository::new(db.pool())
        .list_by_owner(auth.id())
        .await
        .or_internal("Failed to load your listings")?;

    Ok(Json(DataResponse::success(
        format!("You have {} listings", listings.len()),
        listings.into(),
        None,
    )))
}
