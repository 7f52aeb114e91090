// src/types/filters.rs
//! Query-string filters for the browse endpoints

use chrono::NaiveDate;
use rocket::form::FromForm;

use super::common::{GenderPreference, ValidationErrors};
use crate::utils::{clean_optional, split_csv_param};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    StartDate,
}

/// Filter for sublease and Facebook listings
#[derive(Debug, Clone, Default, FromForm)]
pub struct ListingFilter {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<i64>,
    pub min_bathrooms: Option<f64>,
    pub available_from: Option<String>,
    pub available_to: Option<String>,
    pub furnished: Option<bool>,
    pub gender: Option<String>,
    pub area: Option<String>,
    pub amenities: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `ListingFilter` with every field parsed
#[derive(Debug, Clone, Default)]
pub struct ParsedListingFilter {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<i64>,
    pub min_bathrooms: Option<f64>,
    pub available_from: Option<NaiveDate>,
    pub available_to: Option<NaiveDate>,
    pub furnished: Option<bool>,
    pub gender: Option<GenderPreference>,
    pub area: Option<String>,
    pub amenities: Vec<String>,
    pub q: Option<String>,
    pub sort: ListingSort,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_date_param(name: &str, value: Option<&str>, errors: &mut ValidationErrors) -> Option<NaiveDate> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(format!("{} must be a date in YYYY-MM-DD format", name));
            None
        }
    }
}

impl ListingFilter {
    pub fn parse(&self) -> Result<ParsedListingFilter, ValidationErrors> {
        let mut errors = Vec::new();

        let available_from =
            parse_date_param("available_from", self.available_from.as_deref(), &mut errors);
        let available_to =
            parse_date_param("available_to", self.available_to.as_deref(), &mut errors);

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                errors.push("min_price must not exceed max_price".to_string());
            }
        }
        if let (Some(from), Some(to)) = (available_from, available_to) {
            if from > to {
                errors.push("available_from must not be after available_to".to_string());
            }
        }

        let gender = match clean_optional(self.gender.clone()) {
            Some(raw) => match raw.parse::<GenderPreference>() {
                Ok(g) => Some(g),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };

        let sort = match clean_optional(self.sort.clone()).as_deref() {
            None | Some("newest") => ListingSort::Newest,
            Some("price_asc") => ListingSort::PriceAsc,
            Some("price_desc") => ListingSort::PriceDesc,
            Some("start_date") => ListingSort::StartDate,
            Some(other) => {
                errors.push(format!(
                    "Unknown sort '{}'. Use newest, price_asc, price_desc or start_date",
                    other
                ));
                ListingSort::Newest
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ParsedListingFilter {
            min_price: self.min_price,
            max_price: self.max_price,
            bedrooms: self.bedrooms,
            min_bathrooms: self.min_bathrooms,
            available_from,
            available_to,
            furnished: self.furnished,
            gender,
            area: clean_optional(self.area.clone()),
            amenities: split_csv_param(self.amenities.as_deref()),
            q: clean_optional(self.q.clone()),
            sort,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// Filter for agency listings; price and bedrooms match any floor plan
#[derive(Debug, Clone, Default, FromForm)]
pub struct AgencyListingFilter {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<i64>,
    pub pet_friendly: Option<bool>,
    pub area: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Filter for sublease requests
#[derive(Debug, Clone, Default, FromForm)]
pub struct RequestFilter {
    pub budget: Option<i64>,
    pub area: Option<String>,
    pub move_in_after: Option<String>,
    pub move_in_before: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedRequestFilter {
    pub budget: Option<i64>,
    pub area: Option<String>,
    pub move_in_after: Option<NaiveDate>,
    pub move_in_before: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RequestFilter {
    pub fn parse(&self) -> Result<ParsedRequestFilter, ValidationErrors> {
        let mut errors = Vec::new();
        let move_in_after =
            parse_date_param("move_in_after", self.move_in_after.as_deref(), &mut errors);
        let move_in_before =
            parse_date_param("move_in_before", self.move_in_before.as_deref(), &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ParsedRequestFilter {
            budget: self.budget,
            area: clean_optional(self.area.clone()),
            move_in_after,
            move_in_before,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_parses() {
        let parsed = ListingFilter { ..Default::default() }.parse().unwrap();
        assert!(parsed.amenities.is_empty());
        assert_eq!(parsed.sort, ListingSort::Newest);
    }

    #[test]
    fn test_filter_parses_dates_amenities_and_sort() {
        let filter = ListingFilter {
            available_from: Some("2025-01-01".into()),
            available_to: Some("2025-05-01".into()),
            amenities: Some("Gym, Parking".into()),
            gender: Some("female".into()),
            sort: Some("price_asc".into()),
            ..Default::default()
        };
        let parsed = filter.parse().unwrap();
        assert_eq!(parsed.available_from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(parsed.amenities, vec!["Gym".to_string(), "Parking".to_string()]);
        assert_eq!(parsed.gender, Some(GenderPreference::Female));
        assert_eq!(parsed.sort, ListingSort::PriceAsc);
    }

    #[test]
    fn test_filter_reports_bad_values() {
        let filter = ListingFilter {
            min_price: Some(900),
            max_price: Some(500),
            available_from: Some("01/05/2025".into()),
            sort: Some("cheapest".into()),
            ..Default::default()
        };
        let errors = filter.parse().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_request_filter_dates() {
        let filter = RequestFilter {
            move_in_after: Some("2025-08-01".into()),
            move_in_before: Some("bad".into()),
            ..Default::default()
        };
        assert_eq!(filter.parse().unwrap_err().len(), 1);
    }
}
