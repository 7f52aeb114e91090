// src/auth.rs
use crate::core::config_manager::AuthSettings;
use crate::core::Database;
use crate::repository::UserRepository;
use crate::types::{User, UserRole};
use crate::utils::email_matches_domains;
use anyhow::{Context, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // identity provider user id
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
    pub exp: usize,
}

/// Identity carried by a verified token
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

impl From<Claims> for VerifiedIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email.trim().to_lowercase(),
            full_name: claims.user_metadata.and_then(|m| m.full_name),
        }
    }
}

pub struct AuthConfig {
    secret: String,
    pub audience: String,
    pub issuer: Option<String>,
    pub student_domains: Vec<String>,
    pub admin_emails: Vec<String>,
}

impl AuthConfig {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            secret: settings.jwt_secret.clone(),
            audience: settings.audience.clone(),
            issuer: settings.issuer.clone(),
            student_domains: settings
                .student_email_domains
                .iter()
                .map(|d| d.trim().trim_start_matches('@').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            admin_emails: settings
                .admin_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_student_email(&self, email: &str) -> bool {
        email_matches_domains(email, &self.student_domains)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    /// Check signature, expiry, audience and (when configured) issuer
    pub fn verify_token(&self, token: &str) -> Result<VerifiedIdentity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let token_data =
            decode::<Claims>(token, &key, &validation).context("Token rejected")?;

        let identity = VerifiedIdentity::from(token_data.claims);
        if identity.email.is_empty() {
            anyhow::bail!("Token has no email claim");
        }
        Ok(identity)
    }
}

/// Authenticated caller with their stored user row
pub struct AuthenticatedUser {
    pub user: User,
    is_student: bool,
}

impl AuthenticatedUser {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }

    /// Email belongs to a student domain
    pub fn is_student(&self) -> bool {
        self.is_student
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == UserRole::Admin
    }

    /// Owners and admins may modify a record
    pub fn can_modify(&self, owner_id: &str) -> bool {
        self.user.id == owner_id || self.is_admin()
    }
}

/// Last auth failure of a request, read back by the error catchers
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthFailure(pub Option<AuthError>);

fn fail<S>(req: &Request<'_>, status: Status, error: AuthError) -> Outcome<S, AuthError> {
    req.local_cache(|| AuthFailure(Some(error)));
    Outcome::Error((status, error))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_config = match req.guard::<&State<AuthConfig>>().await {
            Outcome::Success(config) => config,
            Outcome::Error((status, _)) => return fail(req, status, AuthError::DatabaseError),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let db = match req.guard::<&State<Database>>().await {
            Outcome::Success(db) => db,
            Outcome::Error((status, _)) => return fail(req, status, AuthError::DatabaseError),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let token = match req.headers().get_one("Authorization") {
            Some(header) if header.starts_with("Bearer ") => header[7..].trim(),
            Some(_) => {
                app_log!(warn, "Invalid Authorization header format");
                return fail(req, Status::Unauthorized, AuthError::InvalidToken);
            }
            None => {
                app_log!(debug, "Missing Authorization header");
                return fail(req, Status::Unauthorized, AuthError::MissingToken);
            }
        };

        let identity = match auth_config.verify_token(token) {
            Ok(identity) => identity,
            Err(e) => {
                app_log!(warn, "Token verification failed: {:#}", e);
                return fail(req, Status::Unauthorized, AuthError::TokenVerificationFailed);
            }
        };

        let users = UserRepository::new(db.pool());
        let mut user = match users
            .upsert_on_login(&identity.id, &identity.email, identity.full_name.as_deref())
            .await
        {
            Ok(user) => user,
            Err(e) => {
                app_log!(error, "Failed to load user {}: {}", identity.email, e);
                return fail(req, Status::InternalServerError, AuthError::DatabaseError);
            }
        };

        if user.role != UserRole::Admin && auth_config.is_admin_email(&user.email) {
            match users.set_role(&user.id, UserRole::Admin).await {
                Ok(_) => {
                    app_log!(info, "Promoted configured admin {}", user.email);
                    user.role = UserRole::Admin;
                }
                Err(e) => {
                    app_log!(error, "Failed to promote admin {}: {}", user.email, e);
                    return fail(req, Status::InternalServerError, AuthError::DatabaseError);
                }
            }
        }

        app_log!(debug, "User {} authenticated as {}", user.email, user.role.as_str());

        let is_student = auth_config.is_student_email(&user.email);
        Outcome::Success(AuthenticatedUser { user, is_student })
    }
}

/// Authenticated caller with the admin role
pub struct AdminUser(pub AuthenticatedUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) if auth.is_admin() => Outcome::Success(AdminUser(auth)),
            Outcome::Success(auth) => {
                app_log!(warn, "Non-admin {} tried an admin route", auth.email());
                fail(req, Status::Forbidden, AuthError::NotAuthorized)
            }
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenVerificationFailed,
    NotAuthorized,
    DatabaseError,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authorization token required",
            AuthError::InvalidToken => "Invalid authorization token format",
            AuthError::TokenVerificationFailed => "Token verification failed",
            AuthError::NotAuthorized => "Admin access required",
            AuthError::DatabaseError => "Database error occurred",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenVerificationFailed => "TOKEN_VERIFICATION_FAILED",
            AuthError::NotAuthorized => "FORBIDDEN",
            AuthError::DatabaseError => "DATABASE_ERROR",
        }
    }
}

// Optional auth guard that doesn't fail if no auth is provided
pub struct OptionalAuth {
    pub user: Option<AuthenticatedUser>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) => Outcome::Success(OptionalAuth { user: Some(auth) }),
            _ => Outcome::Success(OptionalAuth { user: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret";

    fn config(issuer: Option<&str>) -> AuthConfig {
        AuthConfig::from_settings(&AuthSettings {
            jwt_secret: SECRET.to_string(),
            audience: "authenticated".to_string(),
            issuer: issuer.map(str::to_string),
            student_email_domains: vec!["@PSU.edu".to_string()],
            admin_emails: vec![" Admin@PSU.edu ".to_string()],
        })
    }

    fn mint(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_verify_valid_token() {
        let token = mint(
            serde_json::json!({
                "sub": "user-1",
                "email": "ABC123@psu.edu",
                "aud": "authenticated",
                "exp": future_exp(),
                "user_metadata": { "full_name": "Nittany Lion" }
            }),
            SECRET,
        );

        let identity = config(None).verify_token(&token).unwrap();
        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.email, "abc123@psu.edu");
        assert_eq!(identity.full_name.as_deref(), Some("Nittany Lion"));
    }

    #[test]
    fn test_rejects_wrong_secret_audience_and_expiry() {
        let cfg = config(None);
        let claims = |aud: &str, exp: i64| {
            serde_json::json!({ "sub": "u", "email": "u@psu.edu", "aud": aud, "exp": exp })
        };

        assert!(cfg
            .verify_token(&mint(claims("authenticated", future_exp()), "other"))
            .is_err());
        assert!(cfg
            .verify_token(&mint(claims("anon", future_exp()), SECRET))
            .is_err());
        assert!(cfg
            .verify_token(&mint(claims("authenticated", 1_000), SECRET))
            .is_err());
    }

    #[test]
    fn test_issuer_is_checked_when_configured() {
        let token = mint(
            serde_json::json!({
                "sub": "u", "email": "u@psu.edu", "aud": "authenticated",
                "exp": future_exp(), "iss": "https://auth.example.com"
            }),
            SECRET,
        );
        assert!(config(Some("https://auth.example.com")).verify_token(&token).is_ok());
        assert!(config(Some("https://other.example.com")).verify_token(&token).is_err());
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let token = mint(
            serde_json::json!({ "sub": "u", "aud": "authenticated", "exp": future_exp() }),
            SECRET,
        );
        assert!(config(None).verify_token(&token).is_err());
    }

    #[test]
    fn test_domain_and_admin_lists_are_normalized() {
        let cfg = config(None);
        assert!(cfg.is_student_email("xyz5@psu.edu"));
        assert!(!cfg.is_student_email("someone@gmail.com"));
        assert!(cfg.is_admin_email("admin@psu.edu"));
        assert!(!cfg.is_admin_email("xyz5@psu.edu"));
    }
}
