// src/types/agency.rs
//! Property agencies and their listings

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::common::ValidationErrors;
use super::listing::{MAX_BEDROOMS, MAX_IMAGES, MAX_RENT};
use crate::utils::{clean_optional, is_half_step, is_valid_email, normalize_list};

pub const MAX_FLOOR_PLANS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgencyStatus {
    Pending,
    Verified,
    Rejected,
}

impl AgencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgencyStatus::Pending => "pending",
            AgencyStatus::Verified => "verified",
            AgencyStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for AgencyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(AgencyStatus::Pending),
            "verified" => Ok(AgencyStatus::Verified),
            "rejected" => Ok(AgencyStatus::Rejected),
            other => Err(format!("Unknown agency status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Agency {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: String,
    pub logo_url: Option<String>,
    pub status: AgencyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agency {
    pub fn is_verified(&self) -> bool {
        self.status == AgencyStatus::Verified
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgencyInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub description: String,
    pub logo_url: Option<String>,
}

impl AgencyInput {
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: clean_optional(self.phone),
            website: clean_optional(self.website),
            description: self.description.trim().to_string(),
            logo_url: clean_optional(self.logo_url),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        let name_len = self.name.trim().chars().count();
        if name_len < 2 || name_len > 120 {
            errors.push("name must be between 2 and 120 characters".to_string());
        }
        if !is_valid_email(&self.email) {
            errors.push("email is not a valid email address".to_string());
        }
        if let Some(website) = self.website.as_deref().filter(|w| !w.trim().is_empty()) {
            if !(website.starts_with("http://") || website.starts_with("https://")) {
                errors.push("website must start with http:// or https://".to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FloorPlan {
    pub id: i64,
    pub listing_id: i64,
    pub name: String,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub monthly_rent: i64,
    pub square_feet: Option<i64>,
    pub available_from: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloorPlanInput {
    pub name: String,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub monthly_rent: i64,
    pub square_feet: Option<i64>,
    pub available_from: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

impl PriceRange {
    pub fn of(plans: &[FloorPlan]) -> Option<Self> {
        let min = plans.iter().map(|p| p.monthly_rent).min()?;
        let max = plans.iter().map(|p| p.monthly_rent).max()?;
        Some(Self { min, max })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgencyListing {
    pub id: i64,
    pub agency_id: i64,
    pub agency_name: String,
    pub property_name: String,
    pub address: String,
    pub area: Option<String>,
    pub description: String,
    pub amenities: Vec<String>,
    pub image_urls: Vec<String>,
    pub website_url: Option<String>,
    pub pet_friendly: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub floor_plans: Vec<FloorPlan>,
    pub price_range: Option<PriceRange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgencyListingInput {
    pub property_name: String,
    pub address: String,
    pub area: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub website_url: Option<String>,
    #[serde(default)]
    pub pet_friendly: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub floor_plans: Vec<FloorPlanInput>,
}

fn default_active() -> bool {
    true
}

impl AgencyListingInput {
    pub fn normalized(self) -> Self {
        Self {
            property_name: self.property_name.trim().to_string(),
            address: self.address.trim().to_string(),
            area: clean_optional(self.area),
            description: self.description.trim().to_string(),
            amenities: normalize_list(self.amenities),
            image_urls: normalize_list(self.image_urls),
            website_url: clean_optional(self.website_url),
            floor_plans: self
                .floor_plans
                .into_iter()
                .map(|plan| FloorPlanInput {
                    name: plan.name.trim().to_string(),
                    ..plan
                })
                .collect(),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.property_name.trim().is_empty() {
            errors.push("property_name is required".to_string());
        }
        if self.address.trim().is_empty() {
            errors.push("address is required".to_string());
        }
        if self.image_urls.len() > MAX_IMAGES {
            errors.push(format!("at most {} images are allowed", MAX_IMAGES));
        }
        if self.floor_plans.len() > MAX_FLOOR_PLANS {
            errors.push(format!("at most {} floor plans are allowed", MAX_FLOOR_PLANS));
        }

        for (index, plan) in self.floor_plans.iter().enumerate() {
            let label = format!("floor_plans[{}]", index);
            if plan.name.trim().is_empty() {
                errors.push(format!("{}.name is required", label));
            }
            if !(0..=MAX_BEDROOMS).contains(&plan.bedrooms) {
                errors.push(format!("{}.bedrooms must be between 0 and {}", label, MAX_BEDROOMS));
            }
            if !is_half_step(plan.bathrooms) {
                errors.push(format!("{}.bathrooms must be a multiple of 0.5", label));
            }
            if plan.monthly_rent <= 0 || plan.monthly_rent > MAX_RENT {
                errors.push(format!("{}.monthly_rent must be between 1 and {}", label, MAX_RENT));
            }
            if matches!(plan.square_feet, Some(sqft) if sqft <= 0) {
                errors.push(format!("{}.square_feet must be positive", label));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
