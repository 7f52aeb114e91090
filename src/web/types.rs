// src/web/types.rs
use rocket::form::FromForm;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::error;

use crate::types::{User, ValidationErrors};

pub struct ServerConfig {
    pub upload_dir: PathBuf,
    pub max_images: usize,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// JSON body with an optional conversation id echoed in the response
#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardRequest<T> {
    #[serde(flatten)]
    pub data: T,
    pub conversation_id: Option<String>,
}

pub trait WithConversationId {
    fn conversation_id(&self) -> Option<String>;
}

impl<T> WithConversationId for StandardRequest<T> {
    fn conversation_id(&self) -> Option<String> {
        self.conversation_id.clone()
    }
}

/// Error envelope paired with its status code
pub type ApiError = Custom<Json<StandardErrorResponse>>;
pub type ApiResult<T> = Result<T, ApiError>;
pub type Created<T> = Custom<Json<DataResponse<T>>>;

#[derive(FromForm)]
pub struct FacebookUploadForm<'f> {
    pub post_text: Option<String>,
    pub post_url: Option<String>,
    pub author_name: Option<String>,
    pub screenshots: Vec<TempFile<'f>>,
}

/// Profile as returned by `/me`
#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UserInfo {
    #[serde(flatten)]
    pub user: User,
    pub is_student: bool,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ListData<T> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for ListData<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

impl TextResponse {
    pub fn success(message: String, conversation_id: Option<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message,
            conversation_id,
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: String, data: T, conversation_id: Option<String>) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message,
            data,
            conversation_id,
        }
    }

    /// Wrap as a 201 response
    pub fn created(self) -> Created<T> {
        Custom(Status::Created, Json(self))
    }
}

impl ActionResponse {
    pub fn success(message: String, action: String, conversation_id: Option<String>) -> Self {
        Self {
            response_type: ResponseType::Action,
            success: true,
            message,
            action,
            conversation_id,
        }
    }
}

impl StandardErrorResponse {
    pub fn new(
        error: String,
        error_code: String,
        suggestions: Vec<String>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
            conversation_id,
        }
    }

    pub fn with_status(self, status: Status) -> ApiError {
        Custom(status, Json(self))
    }
}

pub fn api_error(status: Status, error: &str, code: &str, suggestions: &[&str]) -> ApiError {
    StandardErrorResponse::new(
        error.to_string(),
        code.to_string(),
        suggestions.iter().map(|s| s.to_string()).collect(),
        None,
    )
    .with_status(status)
}

pub fn validation_error(errors: ValidationErrors) -> ApiError {
    StandardErrorResponse::new(
        "Validation failed".to_string(),
        "VALIDATION_ERROR".to_string(),
        errors,
        None,
    )
    .with_status(Status::UnprocessableEntity)
}

pub fn bad_request(error: &str, suggestions: &[&str]) -> ApiError {
    api_error(Status::BadRequest, error, "BAD_REQUEST", suggestions)
}

pub fn not_found(what: &str) -> ApiError {
    api_error(
        Status::NotFound,
        &format!("{} not found", what),
        "NOT_FOUND",
        &["Check the id and try again"],
    )
}

pub fn forbidden(error: &str) -> ApiError {
    api_error(Status::Forbidden, error, "FORBIDDEN", &[])
}

pub fn conflict(error: &str, suggestions: &[&str]) -> ApiError {
    api_error(Status::Conflict, error, "CONFLICT", suggestions)
}

/// Log an internal failure and hide its details from the caller
pub fn internal_error(context: &str, err: anyhow::Error) -> ApiError {
    error!("{}: {:#}", context, err);
    api_error(
        Status::InternalServerError,
        context,
        "INTERNAL_ERROR",
        &["Try again in a few moments"],
    )
}

pub fn student_required() -> ApiError {
    forbidden("Only PSU students can do this")
}

pub trait ApiErrorExt<T> {
    fn or_internal(self, context: &str) -> ApiResult<T>;
}

impl<T> ApiErrorExt<T> for anyhow::Result<T> {
    fn or_internal(self, context: &str) -> ApiResult<T> {
        self.map_err(|e| internal_error(context, e))
    }
}

/// Attach a conversation id to an error built by the helpers above
pub fn with_conversation(mut err: ApiError, conversation_id: Option<String>) -> ApiError {
    err.1 .0.conversation_id = conversation_id;
    err
}
