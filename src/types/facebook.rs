// src/types/facebook.rs
//! Listings ingested from Facebook group posts

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::common::GenderPreference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Every field came from the LLM
    Llm,
    /// LLM answered but some fields came from pattern matching
    LlmWithHeuristics,
    /// No usable LLM answer
    Heuristics,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Llm => "llm",
            ExtractionMethod::LlmWithHeuristics => "llm_with_heuristics",
            ExtractionMethod::Heuristics => "heuristics",
        }
    }
}

impl FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm" => Ok(ExtractionMethod::Llm),
            "llm_with_heuristics" => Ok(ExtractionMethod::LlmWithHeuristics),
            "heuristics" => Ok(ExtractionMethod::Heuristics),
            other => Err(format!("Unknown extraction method: {}", other)),
        }
    }
}

/// Structured fields pulled out of a post
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub monthly_rent: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub property_name: Option<String>,
    pub address: Option<String>,
    pub amenities: Vec<String>,
    pub special_requirements: Vec<String>,
    pub gender_preference: Option<GenderPreference>,
    pub furnished: Option<bool>,
    pub utilities_included: Option<bool>,
    pub contact: Option<String>,
    pub description: Option<String>,
}

/// Outcome of one pass of the extraction pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub fields: ExtractedFields,
    pub method: ExtractionMethod,
    pub fallback_fields: Vec<String>,
    pub ocr_text: Option<String>,
    pub raw_llm_response: Option<String>,
}

/// Everything needed to insert one `facebook_listings` row
#[derive(Debug, Clone)]
pub struct NewFacebookListing {
    pub submitted_by: Option<String>,
    pub post_url: Option<String>,
    pub author_name: Option<String>,
    pub post_text: String,
    pub image_paths: Vec<String>,
    pub extraction: ExtractionResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacebookListing {
    pub id: i64,
    pub submitted_by: Option<String>,
    pub post_url: Option<String>,
    pub author_name: Option<String>,
    pub post_text: String,
    pub ocr_text: Option<String>,
    pub image_paths: Vec<String>,
    pub title: String,
    pub monthly_rent: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub property_name: Option<String>,
    pub address: Option<String>,
    pub amenities: Vec<String>,
    pub special_requirements: Vec<String>,
    pub gender_preference: GenderPreference,
    pub furnished: Option<bool>,
    pub utilities_included: Option<bool>,
    pub contact: Option<String>,
    pub description: Option<String>,
    pub extraction_method: ExtractionMethod,
    pub fallback_fields: Vec<String>,
    #[serde(skip_serializing)]
    pub raw_llm_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Screenshot sent inline as base64
#[derive(Debug, Clone, Deserialize)]
pub struct InlineImage {
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookExtractRequest {
    #[serde(default)]
    pub post_text: String,
    pub post_url: Option<String>,
    pub author_name: Option<String>,
    #[serde(default)]
    pub images: Vec<InlineImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookPreviewRequest {
    pub post_text: String,
    /// Date used for year inference, defaults to today
    pub reference_date: Option<NaiveDate>,
}
