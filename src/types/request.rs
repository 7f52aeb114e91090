// src/types/request.rs
//! Housing requests posted by students looking for a sublease

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::common::{GenderPreference, ValidationErrors};
use super::listing::{SubleaseListing, MAX_BEDROOMS, MAX_RENT};
use crate::utils::{clean_optional, normalize_list};

#[derive(Debug, Clone, Serialize)]
pub struct SubleaseRequest {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub min_budget: Option<i64>,
    pub max_budget: i64,
    pub preferred_areas: Vec<String>,
    pub move_in_date: NaiveDate,
    pub move_out_date: NaiveDate,
    pub bedrooms: Option<i64>,
    pub gender_preference: GenderPreference,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubleaseRequest {
    /// Whether an active listing satisfies this request's budget, window and preferences
    pub fn is_matched_by(&self, listing: &SubleaseListing) -> bool {
        listing.is_active
            && listing.monthly_rent <= self.max_budget
            && listing.start_date <= self.move_out_date
            && listing.end_date >= self.move_in_date
            && self.bedrooms.map_or(true, |b| b == listing.bedrooms)
            && self
                .gender_preference
                .is_compatible_with(listing.gender_preference)
            && self.matches_area(listing.area.as_deref())
    }

    fn matches_area(&self, area: Option<&str>) -> bool {
        if self.preferred_areas.is_empty() {
            return true;
        }
        let Some(area) = area.map(str::to_lowercase) else {
            return false;
        };
        self.preferred_areas
            .iter()
            .any(|preferred| area.contains(&preferred.to_lowercase()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubleaseRequestInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub min_budget: Option<i64>,
    pub max_budget: i64,
    #[serde(default)]
    pub preferred_areas: Vec<String>,
    pub move_in_date: NaiveDate,
    pub move_out_date: NaiveDate,
    pub bedrooms: Option<i64>,
    #[serde(default)]
    pub gender_preference: GenderPreference,
}

impl SubleaseRequestInput {
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            preferred_areas: normalize_list(self.preferred_areas),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if clean_optional(Some(self.title.clone())).is_none() {
            errors.push("title is required".to_string());
        }
        if self.max_budget <= 0 || self.max_budget > MAX_RENT {
            errors.push(format!("max_budget must be between 1 and {}", MAX_RENT));
        }
        if let Some(min) = self.min_budget {
            if min < 0 {
                errors.push("min_budget must not be negative".to_string());
            } else if min > self.max_budget {
                errors.push("min_budget must not exceed max_budget".to_string());
            }
        }
        if self.move_out_date <= self.move_in_date {
            errors.push("move_out_date must be after move_in_date".to_string());
        }
        if matches!(self.bedrooms, Some(b) if !(0..=MAX_BEDROOMS).contains(&b)) {
            errors.push(format!("bedrooms must be between 0 and {}", MAX_BEDROOMS));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request() -> SubleaseRequest {
        SubleaseRequest {
            id: 1,
            owner_id: "u1".into(),
            title: "Looking for summer sublease".into(),
            description: String::new(),
            min_budget: Some(400),
            max_budget: 800,
            preferred_areas: vec!["Downtown".into()],
            move_in_date: date(2025, 5, 15),
            move_out_date: date(2025, 8, 10),
            bedrooms: None,
            gender_preference: GenderPreference::Female,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn listing() -> SubleaseListing {
        SubleaseListing {
            id: 7,
            owner_id: "u2".into(),
            title: "Summer room".into(),
            description: String::new(),
            property_name: None,
            address: "123 Beaver Ave".into(),
            area: Some("Downtown State College".into()),
            monthly_rent: 700,
            start_date: date(2025, 5, 1),
            end_date: date(2025, 8, 15),
            bedrooms: 2,
            bathrooms: 1.0,
            furnished: true,
            utilities_included: false,
            gender_preference: GenderPreference::Any,
            amenities: vec![],
            image_urls: vec![],
            contact_email: None,
            contact_phone: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_listing_matches_request() {
        assert!(request().is_matched_by(&listing()));
    }

    #[test]
    fn test_mismatches() {
        let req = request();

        let mut expensive = listing();
        expensive.monthly_rent = 900;
        assert!(!req.is_matched_by(&expensive));

        let mut later = listing();
        later.start_date = date(2025, 9, 1);
        later.end_date = date(2025, 12, 31);
        assert!(!req.is_matched_by(&later));

        let mut male_only = listing();
        male_only.gender_preference = GenderPreference::Male;
        assert!(!req.is_matched_by(&male_only));

        let mut elsewhere = listing();
        elsewhere.area = Some("Vairo Blvd".into());
        assert!(!req.is_matched_by(&elsewhere));
    }

    #[test]
    fn test_request_validation() {
        let input = SubleaseRequestInput {
            title: "Need a room".into(),
            description: String::new(),
            min_budget: Some(900),
            max_budget: 800,
            preferred_areas: vec![],
            move_in_date: date(2025, 8, 1),
            move_out_date: date(2025, 7, 1),
            bedrooms: Some(20),
            gender_preference: GenderPreference::Any,
        };
        assert_eq!(input.validate().unwrap_err().len(), 3);
    }
}
