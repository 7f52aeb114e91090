// src/repository/stats.rs
use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::types::AdminStats;

pub struct StatsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StatsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        Ok(sqlx::query_scalar(sql).fetch_one(self.pool).await?)
    }

    pub async fn collect(&self) -> Result<AdminStats> {
        let week_ago = Utc::now() - Duration::days(7);
        let listings_last_7_days: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sublease_listings WHERE created_at >= ?")
                .bind(week_ago)
                .fetch_one(self.pool)
                .await?;

        Ok(AdminStats {
            users: self.count("SELECT COUNT(*) FROM users").await?,
            students: self
                .count("SELECT COUNT(*) FROM users WHERE role = 'student'")
                .await?,
            admins: self
                .count("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .await?,
            sublease_listings_total: self.count("SELECT COUNT(*) FROM sublease_listings").await?,
            sublease_listings_active: self
                .count("SELECT COUNT(*) FROM sublease_listings WHERE is_active = TRUE")
                .await?,
            agencies_pending: self
                .count("SELECT COUNT(*) FROM agencies WHERE status = 'pending'")
                .await?,
            agencies_verified: self
                .count("SELECT COUNT(*) FROM agencies WHERE status = 'verified'")
                .await?,
            agencies_rejected: self
                .count("SELECT COUNT(*) FROM agencies WHERE status = 'rejected'")
                .await?,
            agency_listings: self.count("SELECT COUNT(*) FROM agency_listings").await?,
            sublease_requests: self.count("SELECT COUNT(*) FROM sublease_requests").await?,
            facebook_listings: self.count("SELECT COUNT(*) FROM facebook_listings").await?,
            listings_last_7_days,
        })
    }
}
