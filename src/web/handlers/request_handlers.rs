// src/web/handlers/request_handlers.rs
use crate::auth::AuthenticatedUser;
use crate::core::Database;
use crate::repository::{SubleaseListingRepository, SubleaseRequestRepository};
use crate::types::{RequestFilter, SubleaseListing, SubleaseRequest, SubleaseRequestInput};
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

async fn load_request(repo: &SubleaseRequestRepository<'_>, id: i64) -> ApiResult<SubleaseRequest> {
    repo.find_by_id(id)
        .await
        .or_internal("Failed to load sublease request")?
        .ok_or_else(|| not_found("Sublease request"))
}

pub async fn create_request_handler(
    request: Json<StandardRequest<SubleaseRequestInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<SubleaseRequest>> {
    let conversation_id = request.conversation_id();
    if !auth.is_student() {
        return Err(with_conversation(student_required(), conversation_id));
    }

    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let created = SubleaseRequestRepository::new(db.pool())
        .create(auth.id(), &input)
        .await
        .or_internal("Failed to create sublease request")?;

    info!("User {} posted sublease request {}", auth.email(), created.id);

    Ok(DataResponse::success(
        "Sublease request created".to_string(),
        created,
        conversation_id,
    )
    .created())
}

pub async fn list_requests_handler(
    filter: RequestFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseRequest>>>> {
    let filter = filter.parse().map_err(validation_error)?;

    let requests = SubleaseRequestRepository::new(db.pool())
        .search(&filter)
        .await
        .or_internal("Failed to search sublease requests")?;

    Ok(Json(DataResponse::success(
        format!("Found {} sublease requests", requests.len()),
        requests.into(),
        None,
    )))
}

pub async fn get_request_handler(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseRequest>>> {
    let found = load_request(&SubleaseRequestRepository::new(db.pool()), id).await?;

    Ok(Json(DataResponse::success(
        "Sublease request found".to_string(),
        found,
        None,
    )))
}

pub async fn update_request_handler(
    id: i64,
    request: Json<StandardRequest<SubleaseRequestInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseRequest>>> {
    let conversation_id = request.conversation_id();
    let repo = SubleaseRequestRepository::new(db.pool());
    let existing = load_request(&repo, id).await?;
    if existing.owner_id != auth.id() {
        return Err(forbidden("You can only change your own requests"));
    }

    let input = request.into_inner().data.normalized();
    input
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let updated = repo
        .update(id, &input)
        .await
        .or_internal("Failed to update sublease request")?
        .ok_or_else(|| not_found("Sublease request"))?;

    info!("User {} updated sublease request {}", auth.email(), id);

    Ok(Json(DataResponse::success(
        "Sublease request updated".to_string(),
        updated,
        conversation_id,
    )))
}

pub async fn delete_request_handler(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    let repo = SubleaseRequestRepository::new(db.pool());
    let existing = load_request(&repo, id).await?;
    if !auth.can_modify(&existing.owner_id) {
        return Err(forbidden("You can only delete your own requests"));
    }

    if !repo
        .delete(id)
        .await
        .or_internal("Failed to delete sublease request")?
    {
        return Err(not_found("Sublease request"));
    }

    info!("User {} deleted sublease request {}", auth.email(), id);

    Ok(Json(ActionResponse::success(
        format!("Sublease request {} deleted", id),
        "request_deleted".to_string(),
        None,
    )))
}

pub async fn my_requests_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseRequest>>>> {
    let requests = SubleaseRequestRepository::new(db.pool())
        .list_by_owner(auth.id())
        .await
        .or_internal("Failed to load your sublease requests")?;

    Ok(Json(DataResponse::success(
        format!("You have {} sublease requests", requests.len()),
        requests.into(),
        None,
    )))
}

pub async fn request_matches_handler(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseListing>>>> {
    let found = load_request(&SubleaseRequestRepository::new(db.pool()), id).await?;

    let matches = SubleaseListingRepository::new(db.pool())
        .find_matches(&found)
        .await
        .or_internal("Failed to match listings")?;

    Ok(Json(DataResponse::success(
        format!("{} listings match this request", matches.len()),
        matches.into(),
        None,
    )))
}
