// src/types/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::common::ValidationErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Agency,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Agency => "agency",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "agency" => Ok(UserRole::Agency),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if let Some(name) = &self.full_name {
            if name.trim().chars().count() > 100 {
                errors.push("full_name must be at most 100 characters".to_string());
            }
        }
        if let Some(phone) = &self.phone {
            let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
            if !phone.trim().is_empty() && !(7..=15).contains(&digits) {
                errors.push("phone must contain between 7 and 15 digits".to_string());
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
pub struct RoleUpdate {
    pub role: UserRole,
}

/// Counters shown on the admin dashboard
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminStats {
    pub users: i64,
    pub students: i64,
    pub admins: i64,
    pub sublease_listings_total: i64,
    pub sublease_listings_active: i64,
    pub agencies_pending: i64,
    pub agencies_verified: i64,
    pub agencies_rejected: i64,
    pub agency_listings: i64,
    pub sublease_requests: i64,
    pub facebook_listings: i64,
    pub listings_last_7_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        for role in [UserRole::Student, UserRole::Agency, UserRole::Admin] {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
        }
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_profile_update_validation() {
        let ok = ProfileUpdate {
            full_name: Some("Nittany Lion".into()),
            phone: Some("(814) 555-0100".into()),
        };
        assert!(ok.validate().is_ok());

        let bad = ProfileUpdate {
            full_name: Some("x".repeat(101)),
            phone: Some("12".into()),
        };
        assert_eq!(bad.validate().unwrap_err().len(), 2);
    }
}
