// src/web/handlers/system_handlers.rs
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::core::Database;
use crate::repository::UserRepository;
use crate::types::ProfileUpdate;
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

pub async fn health_handler(
    auth: OptionalAuth,
    db: &State<Database>,
) -> ApiResult<Json<TextResponse>> {
    if let Some(user) = auth.user {
        info!("Health check by authenticated user: {}", user.email());
    } else {
        info!("Health check by anonymous user");
    }

    db.health_check().await.or_internal("Database unavailable")?;

    Ok(Json(TextResponse::success("OK".to_string(), None)))
}

fn user_info(auth: &AuthenticatedUser) -> UserInfo {
    UserInfo {
        user: auth.user().clone(),
        is_student: auth.is_student(),
        is_admin: auth.is_admin(),
    }
}

pub async fn get_current_user_handler(auth: AuthenticatedUser) -> Json<DataResponse<UserInfo>> {
    Json(DataResponse::success(
        format!("Authenticated as {}", auth.email()),
        user_info(&auth),
        None,
    ))
}

pub async fn update_profile_handler(
    request: Json<StandardRequest<ProfileUpdate>>,
    mut auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<UserInfo>>> {
    let conversation_id = request.conversation_id();
    let update = request.into_inner().data;

    update
        .validate()
        .map_err(|errors| with_conversation(validation_error(errors), conversation_id.clone()))?;

    let user = UserRepository::new(db.pool())
        .update_profile(auth.id(), &update)
        .await
        .or_internal("Failed to update profile")?
        .ok_or_else(|| not_found("User"))?;

    info!("User {} updated their profile", user.email);
    auth.user = user;

    Ok(Json(DataResponse::success(
        "Profile updated".to_string(),
        user_info(&auth),
        conversation_id,
    )))
}
