// src/core/database.rs
//! Connection management and schema migrations

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

use crate::core::FsOps;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        phone TEXT,
        role TEXT NOT NULL DEFAULT 'student',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        last_seen_at TEXT NOT NULL,
        CONSTRAINT role_check CHECK (role IN ('student', 'agency', 'admin'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sublease_listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        property_name TEXT,
        address TEXT NOT NULL,
        area TEXT,
        monthly_rent INTEGER NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        bedrooms INTEGER NOT NULL,
        bathrooms REAL NOT NULL,
        furnished BOOLEAN NOT NULL DEFAULT FALSE,
        utilities_included BOOLEAN NOT NULL DEFAULT FALSE,
        gender_preference TEXT NOT NULL DEFAULT 'any',
        amenities TEXT NOT NULL DEFAULT '[]',
        image_urls TEXT NOT NULL DEFAULT '[]',
        contact_email TEXT,
        contact_phone TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sublease_listings_owner ON sublease_listings(owner_id);",
    "CREATE INDEX IF NOT EXISTS idx_sublease_listings_rent ON sublease_listings(monthly_rent);",
    r#"
    CREATE TABLE IF NOT EXISTS agencies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        website TEXT,
        description TEXT NOT NULL DEFAULT '',
        logo_url TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CONSTRAINT status_check CHECK (status IN ('pending', 'verified', 'rejected'))
    );
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_agencies_name ON agencies(lower(name));",
    r#"
    CREATE TABLE IF NOT EXISTS agency_listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        agency_id INTEGER NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
        property_name TEXT NOT NULL,
        address TEXT NOT NULL,
        area TEXT,
        description TEXT NOT NULL DEFAULT '',
        amenities TEXT NOT NULL DEFAULT '[]',
        image_urls TEXT NOT NULL DEFAULT '[]',
        website_url TEXT,
        pet_friendly BOOLEAN NOT NULL DEFAULT FALSE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_agency_listings_agency ON agency_listings(agency_id);",
    r#"
    CREATE TABLE IF NOT EXISTS floor_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        listing_id INTEGER NOT NULL REFERENCES agency_listings(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        bedrooms INTEGER NOT NULL,
        bathrooms REAL NOT NULL,
        monthly_rent INTEGER NOT NULL,
        square_feet INTEGER,
        available_from TEXT
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_floor_plans_listing ON floor_plans(listing_id);",
    r#"
    CREATE TABLE IF NOT EXISTS sublease_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        min_budget INTEGER,
        max_budget INTEGER NOT NULL,
        preferred_areas TEXT NOT NULL DEFAULT '[]',
        move_in_date TEXT NOT NULL,
        move_out_date TEXT NOT NULL,
        bedrooms INTEGER,
        gender_preference TEXT NOT NULL DEFAULT 'any',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sublease_requests_owner ON sublease_requests(owner_id);",
    r#"
    CREATE TABLE IF NOT EXISTS facebook_listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        submitted_by TEXT,
        post_url TEXT,
        author_name TEXT,
        post_text TEXT NOT NULL DEFAULT '',
        ocr_text TEXT,
        image_paths TEXT NOT NULL DEFAULT '[]',
        title TEXT NOT NULL,
        monthly_rent INTEGER,
        start_date TEXT,
        end_date TEXT,
        bedrooms INTEGER,
        bathrooms REAL,
        property_name TEXT,
        address TEXT,
        amenities TEXT NOT NULL DEFAULT '[]',
        special_requirements TEXT NOT NULL DEFAULT '[]',
        gender_preference TEXT NOT NULL DEFAULT 'any',
        furnished BOOLEAN,
        utilities_included BOOLEAN,
        contact TEXT,
        description TEXT,
        extraction_method TEXT NOT NULL,
        fallback_fields TEXT NOT NULL DEFAULT '[]',
        raw_llm_response TEXT,
        created_at TEXT NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_facebook_listings_created ON facebook_listings(created_at);",
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    database_path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            FsOps::ensure_dir_exists(parent).await?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        app_log!(
            info,
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self {
            pool,
            database_path: database_path.to_path_buf(),
        };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.database_path
    }

    async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Migration failed: {}", statement.trim()))?;
        }

        app_log!(info, "Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}
