// src/web/handlers/admin_handlers.rs
use crate::auth::AdminUser;
use crate::core::Database;
use crate::repository::{AgencyRepository, StatsRepository, UserRepository};
use crate::types::{AdminStats, Agency, AgencyStatus, RoleUpdate, User};
use crate::utils::{clean_optional, page_bounds};
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

pub async fn stats_handler(
    _admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<AdminStats>>> {
    let stats = StatsRepository::new(db.pool())
        .collect()
        .await
        .or_internal("Failed to collect statistics")?;

    Ok(Json(DataResponse::success(
        "Dashboard statistics".to_string(),
        stats,
        None,
    )))
}

pub async fn list_users_handler(
    limit: Option<i64>,
    offset: Option<i64>,
    _admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<User>>>> {
    let (limit, offset) = page_bounds(limit, offset);
    let users = UserRepository::new(db.pool())
        .list(limit, offset)
        .await
        .or_internal("Failed to list users")?;

    Ok(Json(DataResponse::success(
        format!("Showing {} users", users.len()),
        users.into(),
        None,
    )))
}

pub async fn set_user_role_handler(
    id: &str,
    request: Json<StandardRequest<RoleUpdate>>,
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<User>>> {
    let conversation_id = request.conversation_id();
    let role = request.data.role;
    let users = UserRepository::new(db.pool());

    if !users
        .set_role(id, role)
        .await
        .or_internal("Failed to update role")?
    {
        return Err(with_conversation(not_found("User"), conversation_id));
    }
    let user = users
        .find_by_id(id)
        .await
        .or_internal("Failed to load user")?
        .ok_or_else(|| not_found("User"))?;

    info!(
        "Admin {} set role of {} to {}",
        admin.0.email(),
        user.email,
        role.as_str()
    );

    Ok(Json(DataResponse::success(
        format!("{} is now {}", user.email, role.as_str()),
        user,
        conversation_id,
    )))
}

pub async fn list_agencies_by_status_handler(
    status: Option<String>,
    _admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<Agency>>>> {
    let status = match clean_optional(status) {
        Some(raw) => Some(
            raw.parse::<AgencyStatus>()
                .map_err(|e| validation_error(vec![e]))?,
        ),
        None => None,
    };

    let agencies = AgencyRepository::new(db.pool())
        .list_by_status(status)
        .await
        .or_internal("Failed to list agencies")?;

    Ok(Json(DataResponse::success(
        format!("Found {} agencies", agencies.len()),
        agencies.into(),
        None,
    )))
}

pub async fn set_agency_status_handler(
    id: i64,
    status: AgencyStatus,
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    let agency = AgencyRepository::new(db.pool())
        .set_status(id, status)
        .await
        .or_internal("Failed to update agency status")?
        .ok_or_else(|| not_found("Agency"))?;

    info!(
        "Admin {} marked agency {} as {}",
        admin.0.email(),
        agency.name,
        status.as_str()
    );

    Ok(Json(DataResponse::success(
        format!("Agency {} is now {}", agency.name, status.as_str()),
        agency,
        None,
    )))
}
