// src/web/handlers/facebook_handlers.rs
use crate::auth::AuthenticatedUser;
use crate::core::fs_ops::{image_extension, media_type_for};
use crate::core::{Database, FsOps, LlmImage};
use crate::facebook_extraction::FacebookExtractor;
use crate::repository::FacebookListingRepository;
use crate::types::{
    ExtractionResult, FacebookExtractRequest, FacebookListing, FacebookPreviewRequest,
    InlineImage, ListingFilter, NewFacebookListing,
};
use crate::utils::clean_optional;
use crate::web::types::*;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use rocket::form::Form;
use rocket::serde::json::Json;
use rocket::State;
use std::path::Path;
use tracing::{error, info, warn};

/// A post as received over either the JSON or the multipart endpoint
struct IncomingPost {
    post_text: String,
    post_url: Option<String>,
    author_name: Option<String>,
    images: Vec<LlmImage>,
    image_paths: Vec<String>,
}

/// Split an inline image into media type and raw bytes; data URLs are accepted
pub fn decode_inline_image(image: &InlineImage) -> Result<LlmImage, String> {
    let (media_type, payload) = match image.data.trim().strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| "malformed data URL".to_string())?;
            let media_type = header.trim_end_matches(";base64").to_string();
            (media_type, payload.to_string())
        }
        None => (image.media_type.trim().to_lowercase(), image.data.trim().to_string()),
    };

    if image_extension(&media_type).is_none() {
        return Err(format!("unsupported image type '{}'", media_type));
    }

    let data = BASE64
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 image data: {}", e))?;
    if data.is_empty() {
        return Err("image is empty".to_string());
    }

    Ok(LlmImage { media_type, data })
}

async fn store_images(upload_dir: &Path, images: &[LlmImage]) -> ApiResult<Vec<String>> {
    let mut stored = Vec::with_capacity(images.len());
    for image in images {
        let extension = image_extension(&image.media_type).unwrap_or("bin");
        match FsOps::store_upload(upload_dir, &image.data, extension).await {
            Ok(path) => stored.push(path.display().to_string()),
            Err(e) => {
                FsOps::remove_files(&stored).await;
                return Err(internal_error("Failed to store screenshot", e));
            }
        }
    }
    Ok(stored)
}

fn check_post(post: &IncomingPost, max_images: usize) -> ApiResult<()> {
    if post.post_text.trim().is_empty() && post.images.is_empty() {
        return Err(bad_request(
            "Nothing to extract",
            &["Send post_text, screenshots, or both"],
        ));
    }
    if post.images.len() > max_images {
        return Err(validation_error(vec![format!(
            "at most {} screenshots are allowed",
            max_images
        )]));
    }
    Ok(())
}

async fn ingest(
    post: IncomingPost,
    auth: &AuthenticatedUser,
    db: &Database,
    extractor: &FacebookExtractor,
) -> ApiResult<FacebookListing> {
    let reference = Utc::now().date_naive();
    let extraction = extractor
        .extract(&post.post_text, post.images, reference)
        .await;

    let new_listing = NewFacebookListing {
        submitted_by: Some(auth.id().to_string()),
        post_url: post.post_url,
        author_name: post.author_name,
        post_text: post.post_text,
        image_paths: post.image_paths,
        extraction,
    };

    match FacebookListingRepository::new(db.pool())
        .insert(&new_listing)
        .await
    {
        Ok(listing) => {
            info!(
                "User {} ingested facebook listing {} via {}",
                auth.email(),
                listing.id,
                listing.extraction_method.as_str()
            );
            Ok(listing)
        }
        Err(e) => {
            FsOps::remove_files(&new_listing.image_paths).await;
            Err(internal_error("Failed to save facebook listing", e))
        }
    }
}

pub async fn extract_facebook_handler(
    request: Json<StandardRequest<FacebookExtractRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    extractor: &State<FacebookExtractor>,
    config: &State<ServerConfig>,
) -> ApiResult<Created<FacebookListing>> {
    let conversation_id = request.conversation_id();
    let body = request.into_inner().data;

    let mut images = Vec::with_capacity(body.images.len());
    let mut problems = Vec::new();
    for (index, image) in body.images.iter().enumerate() {
        match decode_inline_image(image) {
            Ok(decoded) => images.push(decoded),
            Err(e) => problems.push(format!("images[{}]: {}", index, e)),
        }
    }
    if !problems.is_empty() {
        return Err(with_conversation(validation_error(problems), conversation_id));
    }

    let mut post = IncomingPost {
        post_text: body.post_text,
        post_url: clean_optional(body.post_url),
        author_name: clean_optional(body.author_name),
        images,
        image_paths: Vec::new(),
    };
    check_post(&post, config.max_images)
        .map_err(|e| with_conversation(e, conversation_id.clone()))?;

    post.image_paths = store_images(&config.upload_dir, &post.images).await?;
    let listing = ingest(post, &auth, db, extractor).await?;

    Ok(DataResponse::success(
        "Facebook listing extracted".to_string(),
        listing,
        conversation_id,
    )
    .created())
}

pub async fn upload_facebook_handler(
    upload: Form<FacebookUploadForm<'_>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    extractor: &State<FacebookExtractor>,
    config: &State<ServerConfig>,
) -> ApiResult<Created<FacebookListing>> {
    let form = upload.into_inner();

    if form.screenshots.len() > config.max_images {
        return Err(validation_error(vec![format!(
            "at most {} screenshots are allowed",
            config.max_images
        )]));
    }

    let mut images = Vec::new();
    let mut image_paths = Vec::new();
    for mut file in form.screenshots {
        if file.len() == 0 {
            continue;
        }

        let media_type = file
            .content_type()
            .map(|ct| format!("{}/{}", ct.top(), ct.sub()).to_lowercase())
            .filter(|mt| image_extension(mt).is_some())
            .or_else(|| {
                file.raw_name()
                    .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str())
                    .and_then(media_type_for)
                    .map(str::to_string)
            });
        let Some(media_type) = media_type else {
            FsOps::remove_files(&image_paths).await;
            return Err(validation_error(vec![
                "screenshots must be PNG, JPEG or WebP images".to_string(),
            ]));
        };
        let extension = image_extension(&media_type).unwrap_or("bin");

        if let Err(e) = FsOps::ensure_dir_exists(&config.upload_dir).await {
            return Err(internal_error("Failed to prepare upload directory", e));
        }
        let target = config
            .upload_dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), extension));
        if let Err(e) = file.persist_to(&target).await {
            error!("Failed to persist screenshot to {}: {}", target.display(), e);
            FsOps::remove_files(&image_paths).await;
            return Err(internal_error(
                "Failed to store screenshot",
                anyhow::anyhow!(e),
            ));
        }
        image_paths.push(target.display().to_string());

        match FsOps::read_bytes(&target).await {
            Ok(data) => images.push(LlmImage { media_type, data }),
            Err(e) => {
                FsOps::remove_files(&image_paths).await;
                return Err(internal_error("Failed to read screenshot", e));
            }
        }
    }

    let post = IncomingPost {
        post_text: form.post_text.unwrap_or_default(),
        post_url: clean_optional(form.post_url),
        author_name: clean_optional(form.author_name),
        images,
        image_paths,
    };
    if let Err(e) = check_post(&post, config.max_images) {
        FsOps::remove_files(&post.image_paths).await;
        return Err(e);
    }

    let listing = ingest(post, &auth, db, extractor).await?;

    Ok(DataResponse::success(
        "Facebook listing extracted".to_string(),
        listing,
        None,
    )
    .created())
}

pub async fn preview_facebook_handler(
    request: Json<StandardRequest<FacebookPreviewRequest>>,
    auth: AuthenticatedUser,
) -> ApiResult<Json<DataResponse<ExtractionResult>>> {
    let conversation_id = request.conversation_id();
    let body = request.into_inner().data;

    if body.post_text.trim().is_empty() {
        return Err(with_conversation(
            bad_request("post_text is required", &["Paste the text of the post"]),
            conversation_id,
        ));
    }

    let reference = body
        .reference_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let result = FacebookExtractor::extract_heuristics(&body.post_text, reference);

    info!(
        "User {} previewed a facebook post ({} fields from matchers)",
        auth.email(),
        result.fallback_fields.len()
    );

    Ok(Json(DataResponse::success(
        "Preview extracted with pattern matching".to_string(),
        result,
        conversation_id,
    )))
}

pub async fn list_facebook_handler(
    filter: ListingFilter,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ListData<FacebookListing>>>> {
    let filter = filter.parse().map_err(validation_error)?;

    let listings = FacebookListingRepository::new(db.pool())
        .search(&filter)
        .await
        .or_internal("Failed to search facebook listings")?;

    Ok(Json(DataResponse::success(
        format!("Found {} facebook listings", listings.len()),
        listings.into(),
        None,
    )))
}

pub async fn get_facebook_handler(
    id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<FacebookListing>>> {
    let listing = FacebookListingRepository::new(db.pool())
        .find_by_id(id)
        .await
        .or_internal("Failed to load facebook listing")?
        .ok_or_else(|| not_found("Facebook listing"))?;

    Ok(Json(DataResponse::success(
        "Facebook listing found".to_string(),
        listing,
        None,
    )))
}

pub async fn delete_facebook_handler(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    let repo = FacebookListingRepository::new(db.pool());
    let listing = repo
        .find_by_id(id)
        .await
        .or_internal("Failed to load facebook listing")?
        .ok_or_else(|| not_found("Facebook listing"))?;

    let is_submitter = listing.submitted_by.as_deref() == Some(auth.id());
    if !is_submitter && !auth.is_admin() {
        warn!("User {} tried to delete facebook listing {}", auth.email(), id);
        return Err(forbidden("Only the submitter or an admin can delete this listing"));
    }

    if !repo
        .delete(id)
        .await
        .or_internal("Failed to delete facebook listing")?
    {
        return Err(not_found("Facebook listing"));
    }
    FsOps::remove_files(&listing.image_paths).await;

    info!("User {} deleted facebook listing {}", auth.email(), id);

    Ok(Json(ActionResponse::success(
        format!("Facebook listing {} deleted", id),
        "facebook_listing_deleted".to_string(),
        None,
    )))
}
