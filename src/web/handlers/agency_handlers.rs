// src/web/handlers/agency_handlers.rs
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::core::Database;
use crate::repository::{AgencyRegistration, AgencyRepository};
use crate::types::{Agency, AgencyInput, AgencyListing, AgencyListingFilter, AgencyListingInput};
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::{info, warn};

async fn load_agency(repo: &AgencyRepository<'_>, id: i64) -> ApiResult<Agency> {
    repo.find_by_id(id)
        .await
        .or_internal("Failed to load agency")?
        .ok_or_else(|| not_found("Agency"))
}

/// The listing plus its agency, when the caller owns that agency (or is an admin)
async fn owned_agency_listing(
    repo: &AgencyRepository<'_>,
    listing_id: i64,
    auth: &AuthenticatedUser,
    allow_admin: bool,
) -> ApiResult<(Agency, AgencyListing)> {
    let listing = repo
        .find_listing(listing_id)
        .await
        .or_internal("Failed to load agency listing")?
        .ok_or_else(|| not_found("Agency listing"))?;
    let agency = load_agency(repo, listing.agency_id).await?;

    if agency.owner_id != auth.id() && !(allow_admin && auth.is_admin()) {
        return Err(forbidden("You can only change listings of your own agency"));
    }
    Ok((agency, listing))
}

pub async fn register_agency_handler(
    request: Json<StandardRequest<AgencyInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<Agency>> {
    let conversation_id = request.conversation_id();
    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let outcome = AgencyRepository::new(db.pool())
        .register(auth.id(), &input)
        .await
        .or_internal("Failed to register agency")?;

    match outcome {
        AgencyRegistration::Created(agency) => {
            info!("User {} registered agency {} ({})", auth.email(), agency.name, agency.id);
            Ok(DataResponse::success(
                "Agency registered and awaiting verification".to_string(),
                agency,
                conversation_id,
            )
            .created())
        }
        AgencyRegistration::NameTaken => Err(with_conversation(
            conflict(
                &format!("An agency named '{}' already exists", input.name),
                &["Choose a different agency name"],
            ),
            conversation_id,
        )),
        AgencyRegistration::AlreadyOwnsAgency => Err(with_conversation(
            conflict(
                "You already own an agency",
                &["Update your existing agency instead"],
            ),
            conversation_id,
        )),
    }
}

pub async fn list_agencies_handler(
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<Agency>>>> {
    let agencies = AgencyRepository::new(db.pool())
        .list_by_status(Some(crate::types::AgencyStatus::Verified))
        .await
        .or_internal("Failed to list agencies")?;

    Ok(Json(DataResponse::success(
        format!("Found {} agencies", agencies.len()),
        agencies.into(),
        None,
    )))
}

/// Unverified agencies are only visible to their owner and admins
pub async fn get_agency_handler(
    id: i64,
    auth: OptionalAuth,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    let agency = load_agency(&AgencyRepository::new(db.pool()), id).await?;

    let privileged = auth
        .user
        .as_ref()
        .is_some_and(|user| user.can_modify(&agency.owner_id));
    if !agency.is_verified() && !privileged {
        return Err(not_found("Agency"));
    }

    Ok(Json(DataResponse::success(
        "Agency found".to_string(),
        agency,
        None,
    )))
}

pub async fn my_agency_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    let agency = AgencyRepository::new(db.pool())
        .find_by_owner(auth.id())
        .await
        .or_internal("Failed to load agency")?
        .ok_or_else(|| not_found("Agency"))?;

    Ok(Json(DataResponse::success(
        format!("Agency status: {}", agency.status.as_str()),
        agency,
        None,
    )))
}

pub async fn update_agency_handler(
    id: i64,
    request: Json<StandardRequest<AgencyInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    let conversation_id = request.conversation_id();
    let repo = AgencyRepository::new(db.pool());
    let agency = load_agency(&repo, id).await?;
    if !auth.can_modify(&agency.owner_id) {
        return Err(forbidden("You can only update your own agency"));
    }

    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    if repo
        .name_exists(&input.name, Some(id))
        .await
        .or_internal("Failed to check agency name")?
    {
        return Err(with_conversation(
            conflict(
                &format!("An agency named '{}' already exists", input.name),
                &["Choose a different agency name"],
            ),
            conversation_id,
        ));
    }

    let agency = repo
        .update(id, &input)
        .await
        .or_internal("Failed to update agency")?
        .ok_or_else(|| not_found("Agency"))?;

    info!("User {} updated agency {}", auth.email(), id);

    Ok(Json(DataResponse::success(
        "Agency updated".to_string(),
        agency,
        conversation_id,
    )))
}

pub async fn create_agency_listing_handler(
    agency_id: i64,
    request: Json<StandardRequest<AgencyListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<AgencyListing>> {
    let conversation_id = request.conversation_id();
    let repo = AgencyRepository::new(db.pool());
    let agency = load_agency(&repo, agency_id).await?;

    if agency.owner_id != auth.id() {
        return Err(forbidden("You can only publish listings for your own agency"));
    }
    if !agency.is_verified() {
        warn!("Agency {} tried to publish while {}", agency.id, agency.status.as_str());
        return Err(with_conversation(
            api_error(
                rocket::http::Status::Forbidden,
                "Agency is not verified yet",
                "AGENCY_NOT_VERIFIED",
                &["Wait for an administrator to verify your agency"],
            ),
            conversation_id,
        ));
    }

    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let listing = repo
        .create_listing(agency_id, &input)
        .await
        .or_internal("Failed to create agency listing")?;

    info!(
        "Agency {} published listing {} with {} floor plans",
        agency_id,
        listing.id,
        listing.floor_plans.len()
    );

    Ok(DataResponse::success(
        "Agency listing created".to_string(),
        listing,
        conversation_id,
    )
    .created())
}

pub async fn agency_listings_for_agency_handler(
    agency_id: i64,
    auth: OptionalAuth,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<AgencyListing>>>> {
    let repo = AgencyRepository::new(db.pool());
    let agency = load_agency(&repo, agency_id).await?;

    let privileged = auth
        .user
        .as_ref()
        .is_some_and(|user| user.can_modify(&agency.owner_id));
    if !agency.is_verified() && !privileged {
        return Err(not_found("Agency"));
    }

    let mut listings = repo
        .list_for_agency(agency_id)
        .await
        .or_internal("Failed to load agency listings")?;
    if !privileged {
        listings.retain(|listing| listing.is_active);
    }

    Ok(Json(DataResponse::success(
        format!("{} has {} listings", agency.name, listings.len()),
        listings.into(),
        None,
    )))
}

pub async fn search_agency_listings_handler(
    filter: AgencyListingFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<AgencyListing>>>> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(validation_error(vec![
                "min_price must not exceed max_price".to_string()
            ]));
        }
    }

    let listings = AgencyRepository::new(db.pool())
        .search_listings(&filter)
        .await
        .or_internal("Failed to search agency listings")?;

    Ok(Json(DataResponse::success(
        format!("Found {} agency listings", listings.len()),
        listings.into(),
        None,
    )))
}

pub async fn get_agency_listing_handler(
    id: i64,
    auth: OptionalAuth,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<AgencyListing>>> {
    let repo = AgencyRepository::new(db.pool());
    let listing = repo
        .find_listing(id)
        .await
        .or_internal("Failed to load agency listing")?
        .ok_or_else(|| not_found("Agency listing"))?;
    let agency = load_agency(&repo, listing.agency_id).await?;

    let privileged = auth
        .user
        .as_ref()
        .is_some_and(|user| user.can_modify(&agency.owner_id));
    if !privileged && !(agency.is_verified() && listing.is_active) {
        return Err(not_found("Agency listing"));
    }

    Ok(Json(DataResponse::success(
        "Agency listing found".to_string(),
        listing,
        None,
    )))
}

pub async fn update_agency_listing_handler(
    id: i64,
    request: Json<StandardRequest<AgencyListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<AgencyListing>>> {
    let conversation_id = request.conversation_id();
    let repo = AgencyRepository::new(db.pool());
    owned_agency_listing(&repo, id, &auth, false).await?;

    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let listing = repo
        .update_listing(id, &input)
        .await
        .or_internal("Failed to update agency listing")?
        .ok_or_else(|| not_found("Agency listing"))?;

    info!("User {} updated agency listing {}", auth.email(), id);

    Ok(Json(DataResponse::success(
        "Agency listing updated".to_string(),
        listing,
        conversation_id,
    )))
}

pub async fn delete_agency_listing_handler(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    let repo = AgencyRepository::new(db.pool());
    owned_agency_listing(&repo, id, &auth, true).await?;

    if !repo
        .delete_listing(id)
        .await
        .or_internal("Failed to delete agency listing")?
    {
        return Err(not_found("Agency listing"));
    }

    info!("User {} deleted agency listing {}", auth.email(), id);

    Ok(Json(ActionResponse::success(
        format!("Agency listing {} deleted", id),
        "agency_listing_deleted".to_string(),
        None,
    )))
}
