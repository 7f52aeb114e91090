// src/web/mod.rs

pub mod handlers;
pub mod types;

pub use types::*;

use crate::auth::{AdminUser, AuthConfig, AuthFailure, AuthenticatedUser, OptionalAuth};
use crate::core::{ConfigManager, Database};
use crate::facebook_extraction::FacebookExtractor;
use crate::types::{
    AdminStats, Agency, AgencyInput, AgencyListing, AgencyListingFilter, AgencyListingInput,
    AgencyStatus, ExtractionResult, FacebookExtractRequest, FacebookListing,
    FacebookPreviewRequest, ListingFilter, ListingStatusUpdate, ProfileUpdate, RequestFilter,
    RoleUpdate, SubleaseListing, SubleaseListingInput, SubleaseRequest, SubleaseRequestInput, User,
};
use anyhow::Result;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::form::Form;
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{
    catchers, delete, get, options, post, put, routes, Build, Request, Response, Rocket, State,
};
use tracing::{error, info};

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

// System

#[get("/health")]
pub async fn health(auth: OptionalAuth, db: &State<Database>) -> ApiResult<Json<TextResponse>> {
    handlers::health_handler(auth, db).await
}

#[get("/me")]
pub async fn get_current_user(auth: AuthenticatedUser) -> Json<DataResponse<UserInfo>> {
    handlers::get_current_user_handler(auth).await
}

#[put("/me", data = "<request>")]
pub async fn update_profile(
    request: Json<StandardRequest<ProfileUpdate>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<UserInfo>>> {
    handlers::update_profile_handler(request, auth, db).await
}

// Sublease listings

#[post("/sublease-listings", data = "<request>")]
pub async fn create_listing(
    request: Json<StandardRequest<SubleaseListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<SubleaseListing>> {
    handlers::create_listing_handler(request, auth, db).await
}

#[get("/sublease-listings?<filter..>")]
pub async fn list_listings(
    filter: ListingFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseListing>>>> {
    handlers::list_listings_handler(filter, db).await
}

#[get("/sublease-listings/<id>")]
pub async fn get_listing(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseListing>>> {
    handlers::get_listing_handler(id, db).await
}

#[put("/sublease-listings/<id>", data = "<request>")]
pub async fn update_listing(
    id: i64,
    request: Json<StandardRequest<SubleaseListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseListing>>> {
    handlers::update_listing_handler(id, request, auth, db).await
}

#[post("/sublease-listings/<id>/status", data = "<request>")]
pub async fn set_listing_status(
    id: i64,
    request: Json<StandardRequest<ListingStatusUpdate>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::set_listing_status_handler(id, request, auth, db).await
}

#[delete("/sublease-listings/<id>")]
pub async fn delete_listing(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::delete_listing_handler(id, auth, db).await
}

#[get("/me/sublease-listings")]
pub async fn my_listings(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseListing>>>> {
    handlers::my_listings_handler(auth, db).await
}

// Agencies

#[post("/agencies", data = "<request>")]
pub async fn register_agency(
    request: Json<StandardRequest<AgencyInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<Agency>> {
    handlers::register_agency_handler(request, auth, db).await
}

#[get("/agencies")]
pub async fn list_agencies(db: &State<Database>) -> ApiResult<Json<DataResponse<ListData<Agency>>>> {
    handlers::list_agencies_handler(db).await
}

#[get("/agencies/<id>")]
pub async fn get_agency(
    id: i64,
    auth: OptionalAuth,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    handlers::get_agency_handler(id, auth, db).await
}

#[put("/agencies/<id>", data = "<request>")]
pub async fn update_agency(
    id: i64,
    request: Json<StandardRequest<AgencyInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    handlers::update_agency_handler(id, request, auth, db).await
}

#[get("/me/agency")]
pub async fn my_agency(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    handlers::my_agency_handler(auth, db).await
}

#[post("/agencies/<id>/listings", data = "<request>")]
pub async fn create_agency_listing(
    id: i64,
    request: Json<StandardRequest<AgencyListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<AgencyListing>> {
    handlers::create_agency_listing_handler(id, request, auth, db).await
}

#[get("/agencies/<id>/listings")]
pub async fn agency_listings_for_agency(
    id: i64,
    auth: OptionalAuth,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<AgencyListing>>>> {
    handlers::agency_listings_for_agency_handler(id, auth, db).await
}

#[get("/agency-listings?<filter..>")]
pub async fn search_agency_listings(
    filter: AgencyListingFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<AgencyListing>>>> {
    handlers::search_agency_listings_handler(filter, db).await
}

#[get("/agency-listings/<id>")]
pub async fn get_agency_listing(
    id: i64,
    auth: OptionalAuth,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<AgencyListing>>> {
    handlers::get_agency_listing_handler(id, auth, db).await
}

#[put("/agency-listings/<id>", data = "<request>")]
pub async fn update_agency_listing(
    id: i64,
    request: Json<StandardRequest<AgencyListingInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<AgencyListing>>> {
    handlers::update_agency_listing_handler(id, request, auth, db).await
}

#[delete("/agency-listings/<id>")]
pub async fn delete_agency_listing(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::delete_agency_listing_handler(id, auth, db).await
}

// Sublease requests

#[post("/sublease-requests", data = "<request>")]
pub async fn create_request(
    request: Json<StandardRequest<SubleaseRequestInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Created<SubleaseRequest>> {
    handlers::create_request_handler(request, auth, db).await
}

#[get("/sublease-requests?<filter..>")]
pub async fn list_requests(
    filter: RequestFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseRequest>>>> {
    handlers::list_requests_handler(filter, db).await
}

#[get("/sublease-requests/<id>")]
pub async fn get_request(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseRequest>>> {
    handlers::get_request_handler(id, db).await
}

#[put("/sublease-requests/<id>", data = "<request>")]
pub async fn update_request(
    id: i64,
    request: Json<StandardRequest<SubleaseRequestInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<SubleaseRequest>>> {
    handlers::update_request_handler(id, request, auth, db).await
}

#[delete("/sublease-requests/<id>")]
pub async fn delete_request(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::delete_request_handler(id, auth, db).await
}

#[get("/me/sublease-requests")]
pub async fn my_requests(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseRequest>>>> {
    handlers::my_requests_handler(auth, db).await
}

#[get("/sublease-requests/<id>/matches")]
pub async fn request_matches(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<SubleaseListing>>>> {
    handlers::request_matches_handler(id, db).await
}

// Facebook listings

#[post("/facebook-listings/extract", data = "<request>")]
pub async fn extract_facebook(
    request: Json<StandardRequest<FacebookExtractRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    extractor: &State<FacebookExtractor>,
    config: &State<ServerConfig>,
) -> ApiResult<Created<FacebookListing>> {
    handlers::extract_facebook_handler(request, auth, db, extractor, config).await
}

#[post("/facebook-listings/upload", data = "<upload>")]
pub async fn upload_facebook(
    upload: Form<FacebookUploadForm<'_>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    extractor: &State<FacebookExtractor>,
    config: &State<ServerConfig>,
) -> ApiResult<Created<FacebookListing>> {
    handlers::upload_facebook_handler(upload, auth, db, extractor, config).await
}

#[post("/facebook-listings/preview", data = "<request>")]
pub async fn preview_facebook(
    request: Json<StandardRequest<FacebookPreviewRequest>>,
    auth: AuthenticatedUser,
) -> ApiResult<Json<DataResponse<ExtractionResult>>> {
    handlers::preview_facebook_handler(request, auth).await
}

#[get("/facebook-listings?<filter..>")]
pub async fn list_facebook(
    filter: ListingFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<FacebookListing>>>> {
    handlers::list_facebook_handler(filter, db).await
}

#[get("/facebook-listings/<id>")]
pub async fn get_facebook(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<FacebookListing>>> {
    handlers::get_facebook_handler(id, db).await
}

#[delete("/facebook-listings/<id>")]
pub async fn delete_facebook(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::delete_facebook_handler(id, auth, db).await
}

// Admin

#[get("/admin/stats")]
pub async fn admin_stats(
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<AdminStats>>> {
    handlers::stats_handler(admin, db).await
}

#[get("/admin/users?<limit>&<offset>")]
pub async fn admin_users(
    limit: Option<i64>,
    offset: Option<i64>,
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<User>>>> {
    handlers::list_users_handler(limit, offset, admin, db).await
}

#[put("/admin/users/<id>/role", data = "<request>")]
pub async fn admin_set_role(
    id: &str,
    request: Json<StandardRequest<RoleUpdate>>,
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<User>>> {
    handlers::set_user_role_handler(id, request, admin, db).await
}

#[get("/admin/agencies?<status>")]
pub async fn admin_agencies(
    status: Option<String>,
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<Agency>>>> {
    handlers::list_agencies_by_status_handler(status, admin, db).await
}

#[post("/admin/agencies/<id>/verify")]
pub async fn admin_verify_agency(
    id: i64,
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    handlers::set_agency_status_handler(id, AgencyStatus::Verified, admin, db).await
}

#[post("/admin/agencies/<id>/reject")]
pub async fn admin_reject_agency(
    id: i64,
    admin: AdminUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Agency>>> {
    handlers::set_agency_status_handler(id, AgencyStatus::Rejected, admin, db).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers

fn auth_failure(req: &Request<'_>) -> Option<crate::auth::AuthError> {
    req.local_cache(AuthFailure::default).0
}

#[rocket::catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Invalid request format".to_string(),
        "BAD_REQUEST".to_string(),
        vec![
            "Check your request JSON format".to_string(),
            "Verify all required fields are present".to_string(),
        ],
        None,
    ))
}

#[rocket::catch(401)]
pub fn unauthorized(req: &Request<'_>) -> Json<StandardErrorResponse> {
    let (error, code) = auth_failure(req)
        .map(|e| (e.message(), e.code()))
        .unwrap_or(("Authentication required", "UNAUTHORIZED"));

    Json(StandardErrorResponse::new(
        error.to_string(),
        code.to_string(),
        vec!["Sign in and send the token as 'Authorization: Bearer <token>'".to_string()],
        None,
    ))
}

#[rocket::catch(403)]
pub fn forbidden(req: &Request<'_>) -> Json<StandardErrorResponse> {
    let error = auth_failure(req)
        .map(|e| e.message())
        .unwrap_or("Access denied");

    Json(StandardErrorResponse::new(
        error.to_string(),
        "FORBIDDEN".to_string(),
        vec!["Ask an administrator for access".to_string()],
        None,
    ))
}

#[rocket::catch(404)]
pub fn not_found(req: &Request<'_>) -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        format!("No route for {} {}", req.method(), req.uri().path()),
        "NOT_FOUND".to_string(),
        vec!["Check the endpoint path".to_string()],
        None,
    ))
}

#[rocket::catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Request body could not be processed".to_string(),
        "UNPROCESSABLE_ENTITY".to_string(),
        vec![
            "Check field names and value types".to_string(),
            "Dates use the YYYY-MM-DD format".to_string(),
        ],
        None,
    ))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Internal server error".to_string(),
        "INTERNAL_ERROR".to_string(),
        vec![
            "Try again in a few moments".to_string(),
            "Contact support if the problem persists".to_string(),
        ],
        None,
    ))
}

/// Assemble the server with all routes, catchers and managed state
pub fn build_rocket(
    config: &ConfigManager,
    db: Database,
    extractor: FacebookExtractor,
) -> Rocket<Build> {
    let server_config = ServerConfig {
        upload_dir: config.server.upload_path.clone(),
        max_images: extractor.max_images(),
    };
    let auth_config = AuthConfig::from_settings(&config.auth);

    let limits = Limits::default()
        .limit("json", 32.mebibytes())
        .limit("file", 10.mebibytes())
        .limit("data-form", 48.mebibytes());
    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("limits", limits));

    rocket::custom(figment)
        .attach(Cors)
        .manage(server_config)
        .manage(auth_config)
        .manage(db)
        .manage(extractor)
        .register(
            "/api",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                internal_error
            ],
        )
        .mount(
            "/api",
            routes![
                health,
                get_current_user,
                update_profile,
                create_listing,
                list_listings,
                get_listing,
                update_listing,
                set_listing_status,
                delete_listing,
                my_listings,
                register_agency,
                list_agencies,
                get_agency,
                update_agency,
                my_agency,
                create_agency_listing,
                agency_listings_for_agency,
                search_agency_listings,
                get_agency_listing,
                update_agency_listing,
                delete_agency_listing,
                create_request,
                list_requests,
                get_request,
                update_request,
                delete_request,
                my_requests,
                request_matches,
                extract_facebook,
                upload_facebook,
                preview_facebook,
                list_facebook,
                get_facebook,
                delete_facebook,
                admin_stats,
                admin_users,
                admin_set_role,
                admin_agencies,
                admin_verify_agency,
                admin_reject_agency,
                options,
            ],
        )
}

// Main server start function
pub async fn start_web_server(config: ConfigManager) -> Result<()> {
    config.validate()?;
    config.ensure_directories().await?;

    let db = match Database::new(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e);
        }
    };

    let extractor = FacebookExtractor::from_settings(&config.llm)?;

    info!("Starting PSU sublease API server on port {}", config.server.port);
    info!("Database: {}", db.path().display());
    info!("Uploads: {}", config.server.upload_path.display());
    info!(
        "Facebook extraction: {}",
        if extractor.llm_enabled() {
            "LLM with pattern fallback"
        } else {
            "pattern matching only"
        }
    );

    let _rocket = build_rocket(&config, db, extractor)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed: {}", e))?;

    Ok(())
}
