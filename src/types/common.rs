// src/types/common.rs
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Problems found while validating user input, one human-readable line each
pub type ValidationErrors = Vec<String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    #[default]
    Any,
    Female,
    Male,
}

impl GenderPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderPreference::Any => "any",
            GenderPreference::Female => "female",
            GenderPreference::Male => "male",
        }
    }

    /// Two preferences can share a unit unless they name different genders
    pub fn is_compatible_with(&self, other: GenderPreference) -> bool {
        matches!(
            (self, other),
            (GenderPreference::Any, _) | (_, GenderPreference::Any)
        ) || *self == other
    }
}

impl FromStr for GenderPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "any" | "none" | "either" | "no preference" => Ok(GenderPreference::Any),
            "female" | "f" | "women" | "woman" | "girls" => Ok(GenderPreference::Female),
            "male" | "m" | "men" | "man" | "guys" => Ok(GenderPreference::Male),
            other => Err(format!("Unknown gender preference: {}", other)),
        }
    }
}

/// Encode a string list for a JSON text column
pub fn to_json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a JSON text column; malformed content reads as empty
pub fn from_json_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Parse the text form of a stored gender preference, defaulting to `Any`
pub fn gender_from_column(raw: &str) -> GenderPreference {
    raw.parse().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse() {
        assert_eq!("Female".parse::<GenderPreference>(), Ok(GenderPreference::Female));
        assert_eq!("guys".parse::<GenderPreference>(), Ok(GenderPreference::Male));
        assert_eq!("".parse::<GenderPreference>(), Ok(GenderPreference::Any));
        assert!("robot".parse::<GenderPreference>().is_err());
    }

    #[test]
    fn test_gender_compatibility() {
        assert!(GenderPreference::Any.is_compatible_with(GenderPreference::Male));
        assert!(GenderPreference::Female.is_compatible_with(GenderPreference::Any));
        assert!(GenderPreference::Female.is_compatible_with(GenderPreference::Female));
        assert!(!GenderPreference::Female.is_compatible_with(GenderPreference::Male));
    }

    #[test]
    fn test_json_list_columns() {
        let items = vec!["Gym".to_string(), "Pool".to_string()];
        assert_eq!(from_json_list(&to_json_list(&items)), items);
        assert!(from_json_list("not json").is_empty());
    }
}
