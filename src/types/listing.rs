// src/types/listing.rs
//! Student sublease listings

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::common::{GenderPreference, ValidationErrors};
use crate::utils::{clean_optional, is_half_step, is_valid_email, normalize_list};

pub const MAX_RENT: i64 = 20_000;
pub const MAX_BEDROOMS: i64 = 12;
pub const MAX_IMAGES: usize = 12;

#[derive(Debug, Clone, Serialize)]
pub struct SubleaseListing {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub property_name: Option<String>,
    pub address: String,
    pub area: Option<String>,
    pub monthly_rent: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub furnished: bool,
    pub utilities_included: bool,
    pub gender_preference: GenderPreference,
    pub amenities: Vec<String>,
    pub image_urls: Vec<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of create and update requests
#[derive(Debug, Clone, Deserialize)]
pub struct SubleaseListingInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub property_name: Option<String>,
    pub address: String,
    pub area: Option<String>,
    pub monthly_rent: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bedrooms: i64,
    pub bathrooms: f64,
    #[serde(default)]
    pub furnished: bool,
    #[serde(default)]
    pub utilities_included: bool,
    #[serde(default)]
    pub gender_preference: GenderPreference,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl SubleaseListingInput {
    /// Trim text fields and de-duplicate lists
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            property_name: clean_optional(self.property_name),
            address: self.address.trim().to_string(),
            area: clean_optional(self.area),
            amenities: normalize_list(self.amenities),
            image_urls: normalize_list(self.image_urls),
            contact_email: clean_optional(self.contact_email),
            contact_phone: clean_optional(self.contact_phone),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("title is required".to_string());
        } else if self.title.trim().chars().count() > 120 {
            errors.push("title must be at most 120 characters".to_string());
        }
        if self.address.trim().is_empty() {
            errors.push("address is required".to_string());
        }
        if self.monthly_rent <= 0 || self.monthly_rent > MAX_RENT {
            errors.push(format!("monthly_rent must be between 1 and {}", MAX_RENT));
        }
        if self.end_date <= self.start_date {
            errors.push("end_date must be after start_date".to_string());
        }
        if !(0..=MAX_BEDROOMS).contains(&self.bedrooms) {
            errors.push(format!("bedrooms must be between 0 and {}", MAX_BEDROOMS));
        }
        if !is_half_step(self.bathrooms) || self.bathrooms > MAX_BEDROOMS as f64 {
            errors.push("bathrooms must be a non-negative multiple of 0.5".to_string());
        }
        if self.image_urls.len() > MAX_IMAGES {
            errors.push(format!("at most {} images are allowed", MAX_IMAGES));
        }
        if let Some(email) = self.contact_email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !is_valid_email(email) {
                errors.push("contact_email is not a valid email address".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListingStatusUpdate {
    pub is_active: bool,
}
