// src/utils.rs
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Trim a free-text field, mapping blank input to `None`
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim, drop blanks and de-duplicate (case-insensitive, first spelling wins)
pub fn normalize_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// Split a comma separated query value into normalized entries
pub fn split_csv_param(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| normalize_list(v.split(',').map(String::from).collect()))
        .unwrap_or_default()
}

/// Domain part of an email address, lowercased
pub fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain.to_lowercase())
}

pub fn is_valid_email(email: &str) -> bool {
    match email_domain(email) {
        Some(domain) => domain.contains('.') && !email.contains(char::is_whitespace),
        None => false,
    }
}

/// Whether the email belongs to one of the domains (or a subdomain of one)
pub fn email_matches_domains(email: &str, domains: &[String]) -> bool {
    let Some(domain) = email_domain(email) else {
        return false;
    };
    domains.iter().any(|allowed| {
        let allowed = allowed.trim().trim_start_matches('@').to_lowercase();
        domain == allowed || domain.ends_with(&format!(".{}", allowed))
    })
}

/// Bathrooms come in half steps
pub fn is_half_step(value: f64) -> bool {
    value >= 0.0 && (value * 2.0).fract() == 0.0
}

/// Clamp pagination parameters to sane bounds
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  Beaver Hill ".into())), Some("Beaver Hill".into()));
        assert_eq!(clean_optional(Some("   ".into())), None);
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn test_normalize_list() {
        let items = vec![" Gym".into(), "gym".into(), "".into(), "Pool".into()];
        assert_eq!(normalize_list(items), vec!["Gym".to_string(), "Pool".to_string()]);
    }

    #[test]
    fn test_split_csv_param() {
        assert_eq!(
            split_csv_param(Some("Gym, Parking,,gym")),
            vec!["Gym".to_string(), "Parking".to_string()]
        );
        assert!(split_csv_param(None).is_empty());
    }

    #[test]
    fn test_email_domain_matching() {
        let domains = vec!["psu.edu".to_string()];
        assert!(email_matches_domains("abc123@psu.edu", &domains));
        assert!(email_matches_domains("abc123@PSU.EDU", &domains));
        assert!(email_matches_domains("abc123@cse.psu.edu", &domains));
        assert!(!email_matches_domains("abc123@notpsu.edu", &domains));
        assert!(!email_matches_domains("abc123@gmail.com", &domains));
        assert!(!email_matches_domains("no-at-sign", &domains));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("leasing@example.com"));
        assert!(!is_valid_email("leasing@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn test_is_half_step() {
        assert!(is_half_step(1.0));
        assert!(is_half_step(2.5));
        assert!(!is_half_step(1.25));
        assert!(!is_half_step(-1.0));
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page_bounds(Some(500), Some(-3)), (MAX_PAGE_SIZE, 0));
        assert_eq!(page_bounds(Some(0), Some(40)), (1, 40));
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(" The Rise "), "%the rise%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
