// src/repository/users.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::types::{ProfileUpdate, User, UserRole};
use crate::utils::clean_optional;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: Option<String>,
    phone: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            role: row.role.parse().unwrap_or(UserRole::Student),
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_seen_at: row.last_seen_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, full_name, phone, role, created_at, updated_at, last_seen_at";

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower(?)",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Insert the user on first sight, otherwise refresh email and last-seen time
    pub async fn upsert_on_login(
        &self,
        id: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<User> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, phone, role, created_at, updated_at, last_seen_at)
            VALUES (?, ?, ?, NULL, 'student', ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                full_name = COALESCE(users.full_name, excluded.full_name),
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(id)
        .bind(email.trim().to_lowercase())
        .bind(full_name.map(str::trim).filter(|n| !n.is_empty()))
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to upsert user {}", email))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} vanished after upsert", id))
    }

    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<User>> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = ?, phone = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(clean_optional(update.full_name.clone()))
        .bind(clean_optional(update.phone.clone()))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn set_role(&self, id: &str, role: UserRole) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            app_log!(info, "Set role of user {} to {}", id, role.as_str());
        }
        Ok(updated)
    }

    pub async fn set_role_by_email(&self, email: &str, role: UserRole) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE lower(email) = lower(?)")
                .bind(role.as_str())
                .bind(Utc::now())
                .bind(email.trim())
                .execute(self.pool)
                .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            app_log!(info, "Set role of {} to {}", email, role.as_str());
        }
        Ok(updated)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::test_support::temp_database;

    #[tokio::test]
    async fn test_upsert_keeps_first_name_and_role() {
        let db = temp_database().await;
        let repo = UserRepository::new(db.pool());

        let user = repo
            .upsert_on_login("sub-1", "ABC123@psu.edu", Some("Nittany Lion"))
            .await
            .unwrap();
        assert_eq!(user.email, "abc123@psu.edu");
        assert_eq!(user.role, UserRole::Student);

        assert!(repo.set_role("sub-1", UserRole::Admin).await.unwrap());

        let again = repo
            .upsert_on_login("sub-1", "abc123@psu.edu", Some("Someone Else"))
            .await
            .unwrap();
        assert_eq!(again.full_name.as_deref(), Some("Nittany Lion"));
        assert_eq!(again.role, UserRole::Admin);
        assert!(again.last_seen_at >= user.last_seen_at);
    }

    #[tokio::test]
    async fn test_profile_update_and_lookup() {
        let db = temp_database().await;
        let repo = UserRepository::new(db.pool());
        repo.upsert_on_login("sub-2", "xyz9@psu.edu", None).await.unwrap();

        let updated = repo
            .update_profile(
                "sub-2",
                &ProfileUpdate {
                    full_name: Some(" Pat ".into()),
                    phone: Some("814-555-0100".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Pat"));

        assert!(repo.find_by_email("XYZ9@psu.edu").await.unwrap().is_some());
        assert!(repo.update_profile("missing", &ProfileUpdate { full_name: None, phone: None })
            .await
            .unwrap()
            .is_none());
        assert!(repo.set_role_by_email("xyz9@psu.edu", UserRole::Agency).await.unwrap());
        assert_eq!(repo.list(10, 0).await.unwrap().len(), 1);
    }
}
