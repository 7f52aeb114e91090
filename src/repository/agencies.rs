// src/repository/agencies.rs
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;

use crate::types::common::{from_json_list, to_json_list};
use crate::types::{
    Agency, AgencyInput, AgencyListing, AgencyListingFilter, AgencyListingInput, AgencyStatus,
    FloorPlan, FloorPlanInput, PriceRange,
};
use crate::utils::{clean_optional, like_pattern, page_bounds};

#[derive(Debug, sqlx::FromRow)]
struct AgencyRow {
    id: i64,
    owner_id: String,
    name: String,
    email: String,
    phone: Option<String>,
    website: Option<String>,
    description: String,
    logo_url: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AgencyRow> for Agency {
    fn from(row: AgencyRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            website: row.website,
            description: row.description,
            logo_url: row.logo_url,
            status: row.status.parse().unwrap_or(AgencyStatus::Pending),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AgencyListingRow {
    id: i64,
    agency_id: i64,
    agency_name: String,
    property_name: String,
    address: String,
    area: Option<String>,
    description: String,
    amenities: String,
    image_urls: String,
    website_url: Option<String>,
    pet_friendly: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgencyListingRow {
    fn into_listing(self, floor_plans: Vec<FloorPlan>) -> AgencyListing {
        let price_range = PriceRange::of(&floor_plans);
        AgencyListing {
            id: self.id,
            agency_id: self.agency_id,
            agency_name: self.agency_name,
            property_name: self.property_name,
            address: self.address,
            area: self.area,
            description: self.description,
            amenities: from_json_list(&self.amenities),
            image_urls: from_json_list(&self.image_urls),
            website_url: self.website_url,
            pet_friendly: self.pet_friendly,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            floor_plans,
            price_range,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FloorPlanRow {
    id: i64,
    listing_id: i64,
    name: String,
    bedrooms: i64,
    bathrooms: f64,
    monthly_rent: i64,
    square_feet: Option<i64>,
    available_from: Option<NaiveDate>,
}

impl From<FloorPlanRow> for FloorPlan {
    fn from(row: FloorPlanRow) -> Self {
        Self {
            id: row.id,
            listing_id: row.listing_id,
            name: row.name,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            monthly_rent: row.monthly_rent,
            square_feet: row.square_feet,
            available_from: row.available_from,
        }
    }
}

const AGENCY_COLUMNS: &str =
    "id, owner_id, name, email, phone, website, description, logo_url, status, created_at, updated_at";

const LISTING_SELECT: &str = "SELECT l.id, l.agency_id, a.name AS agency_name, l.property_name, \
    l.address, l.area, l.description, l.amenities, l.image_urls, l.website_url, l.pet_friendly, \
    l.is_active, l.created_at, l.updated_at \
    FROM agency_listings l JOIN agencies a ON a.id = l.agency_id";

/// Result of registering an agency
#[derive(Debug)]
pub enum AgencyRegistration {
    Created(Agency),
    NameTaken,
    AlreadyOwnsAgency,
}

fn registration_conflict(err: &sqlx::Error) -> Option<AgencyRegistration> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }
    if db_err.message().contains("owner_id") {
        Some(AgencyRegistration::AlreadyOwnsAgency)
    } else {
        Some(AgencyRegistration::NameTaken)
    }
}

pub struct AgencyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AgencyRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a pending agency and switch its owner to the agency role
    pub async fn register(&self, owner_id: &str, input: &AgencyInput) -> Result<AgencyRegistration> {
        if self.find_by_owner(owner_id).await?.is_some() {
            return Ok(AgencyRegistration::AlreadyOwnsAgency);
        }
        if self.name_exists(&input.name, None).await? {
            return Ok(AgencyRegistration::NameTaken);
        }
        self.insert_registration(owner_id, input).await
    }

    async fn insert_registration(
        &self,
        owner_id: &str,
        input: &AgencyInput,
    ) -> Result<AgencyRegistration> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO agencies (owner_id, name, email, phone, website, description, logo_url, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.website)
        .bind(&input.description)
        .bind(&input.logo_url)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        // A concurrent registration can still hit the unique indexes
        let result = match result {
            Ok(result) => result,
            Err(e) => match registration_conflict(&e) {
                Some(conflict) => return Ok(conflict),
                None => return Err(anyhow::Error::new(e).context("Failed to insert agency")),
            },
        };

        let id = result.last_insert_rowid();

        // Admins keep their role
        sqlx::query("UPDATE users SET role = 'agency', updated_at = ? WHERE id = ? AND role = 'student'")
            .bind(now)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        app_log!(info, "Registered agency {} ({}) for owner {}", id, input.name, owner_id);

        let agency = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Agency {} vanished after insert", id))?;
        Ok(AgencyRegistration::Created(agency))
    }

    pub async fn name_exists(&self, name: &str, except_id: Option<i64>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM agencies WHERE lower(name) = lower(?) AND id != ?",
        )
        .bind(name.trim())
        .bind(except_id.unwrap_or(-1))
        .fetch_one(self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Agency>> {
        let row = sqlx::query_as::<_, AgencyRow>(&format!(
            "SELECT {} FROM agencies WHERE id = ?",
            AGENCY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Agency::from))
    }

    pub async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Agency>> {
        let row = sqlx::query_as::<_, AgencyRow>(&format!(
            "SELECT {} FROM agencies WHERE owner_id = ?",
            AGENCY_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Agency::from))
    }

    pub async fn list_by_status(&self, status: Option<AgencyStatus>) -> Result<Vec<Agency>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, AgencyRow>(&format!(
                    "SELECT {} FROM agencies WHERE status = ? ORDER BY created_at ASC, id ASC",
                    AGENCY_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AgencyRow>(&format!(
                    "SELECT {} FROM agencies ORDER BY created_at ASC, id ASC",
                    AGENCY_COLUMNS
                ))
                .fetch_all(self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(Agency::from).collect())
    }

    /// Update contact details; the caller has checked for name clashes
    pub async fn update(&self, id: i64, input: &AgencyInput) -> Result<Option<Agency>> {
        let result = sqlx::query(
            r#"
            UPDATE agencies
            SET name = ?, email = ?, phone = ?, website = ?, description = ?, logo_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.website)
        .bind(&input.description)
        .bind(&input.logo_url)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to update agency {}", id))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn set_status(&self, id: i64, status: AgencyStatus) -> Result<Option<Agency>> {
        let result = sqlx::query("UPDATE agencies SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        app_log!(info, "Agency {} is now {}", id, status.as_str());
        self.find_by_id(id).await
    }

    pub async fn create_listing(
        &self,
        agency_id: i64,
        input: &AgencyListingInput,
    ) -> Result<AgencyListing> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO agency_listings (
                agency_id, property_name, address, area, description, amenities, image_urls,
                website_url, pet_friendly, is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(agency_id)
        .bind(&input.property_name)
        .bind(&input.address)
        .bind(&input.area)
        .bind(&input.description)
        .bind(to_json_list(&input.amenities))
        .bind(to_json_list(&input.image_urls))
        .bind(&input.website_url)
        .bind(input.pet_friendly)
        .bind(input.is_active)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to insert agency listing")?;

        let listing_id = result.last_insert_rowid();
        insert_floor_plans(&mut *tx, listing_id, &input.floor_plans).await?;
        tx.commit().await?;

        app_log!(
            info,
            "Created agency listing {} with {} floor plans for agency {}",
            listing_id,
            input.floor_plans.len(),
            agency_id
        );

        self.find_listing(listing_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Agency listing {} vanished after insert", listing_id))
    }

    /// Update a listing and replace its floor plans
    pub async fn update_listing(
        &self,
        listing_id: i64,
        input: &AgencyListingInput,
    ) -> Result<Option<AgencyListing>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE agency_listings SET
                property_name = ?, address = ?, area = ?, description = ?, amenities = ?,
                image_urls = ?, website_url = ?, pet_friendly = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.property_name)
        .bind(&input.address)
        .bind(&input.area)
        .bind(&input.description)
        .bind(to_json_list(&input.amenities))
        .bind(to_json_list(&input.image_urls))
        .bind(&input.website_url)
        .bind(input.pet_friendly)
        .bind(input.is_active)
        .bind(Utc::now())
        .bind(listing_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update agency listing {}", listing_id))?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM floor_plans WHERE listing_id = ?")
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;
        insert_floor_plans(&mut *tx, listing_id, &input.floor_plans).await?;
        tx.commit().await?;

        self.find_listing(listing_id).await
    }

    pub async fn delete_listing(&self, listing_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM floor_plans WHERE listing_id = ?")
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM agency_listings WHERE id = ?")
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_listing(&self, listing_id: i64) -> Result<Option<AgencyListing>> {
        let row = sqlx::query_as::<_, AgencyListingRow>(&format!("{} WHERE l.id = ?", LISTING_SELECT))
            .bind(listing_id)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut plans = self.floor_plans_for(&[row.id]).await?;
        let floor_plans = plans.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_listing(floor_plans)))
    }

    pub async fn list_for_agency(&self, agency_id: i64) -> Result<Vec<AgencyListing>> {
        let rows = sqlx::query_as::<_, AgencyListingRow>(&format!(
            "{} WHERE l.agency_id = ? ORDER BY l.created_at DESC, l.id DESC",
            LISTING_SELECT
        ))
        .bind(agency_id)
        .fetch_all(self.pool)
        .await?;
        self.attach_floor_plans(rows).await
    }

    /// Active listings of verified agencies; price and bedroom filters match any floor plan
    pub async fn search_listings(&self, filter: &AgencyListingFilter) -> Result<Vec<AgencyListing>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "{} WHERE l.is_active = TRUE AND a.status = 'verified'",
            LISTING_SELECT
        ));

        if filter.min_price.is_some() || filter.max_price.is_some() || filter.bedrooms.is_some() {
            qb.push(" AND EXISTS (SELECT 1 FROM floor_plans fp WHERE fp.listing_id = l.id");
            if let Some(min) = filter.min_price {
                qb.push(" AND fp.monthly_rent >= ").push_bind(min);
            }
            if let Some(max) = filter.max_price {
                qb.push(" AND fp.monthly_rent <= ").push_bind(max);
            }
            if let Some(bedrooms) = filter.bedrooms {
                qb.push(" AND fp.bedrooms = ").push_bind(bedrooms);
            }
            qb.push(")");
        }
        if let Some(pet_friendly) = filter.pet_friendly {
            qb.push(" AND l.pet_friendly = ").push_bind(pet_friendly);
        }
        if let Some(area) = clean_optional(filter.area.clone()) {
            qb.push(" AND lower(l.area) LIKE ")
                .push_bind(like_pattern(&area))
                .push(" ESCAPE '\\'");
        }
        if let Some(q) = clean_optional(filter.q.clone()) {
            let pattern = like_pattern(&q);
            qb.push(" AND (lower(l.property_name) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(l.description) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(l.address) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        let (limit, offset) = page_bounds(filter.limit, filter.offset);
        qb.push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build_query_as::<AgencyListingRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to search agency listings")?;
        self.attach_floor_plans(rows).await
    }

    async fn attach_floor_plans(&self, rows: Vec<AgencyListingRow>) -> Result<Vec<AgencyListing>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut plans = self.floor_plans_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let floor_plans = plans.remove(&row.id).unwrap_or_default();
                row.into_listing(floor_plans)
            })
            .collect())
    }

    async fn floor_plans_for(&self, listing_ids: &[i64]) -> Result<HashMap<i64, Vec<FloorPlan>>> {
        let mut grouped: HashMap<i64, Vec<FloorPlan>> = HashMap::new();
        if listing_ids.is_empty() {
            return Ok(grouped);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, listing_id, name, bedrooms, bathrooms, monthly_rent, square_feet, available_from \
             FROM floor_plans WHERE listing_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in listing_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY monthly_rent ASC, id ASC");

        let rows = qb
            .build_query_as::<FloorPlanRow>()
            .fetch_all(self.pool)
            .await?;
        for row in rows {
            grouped.entry(row.listing_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

async fn insert_floor_plans(
    conn: &mut SqliteConnection,
    listing_id: i64,
    plans: &[FloorPlanInput],
) -> Result<()> {
    for plan in plans {
        sqlx::query(
            r#"
            INSERT INTO floor_plans (listing_id, name, bedrooms, bathrooms, monthly_rent, square_feet, available_from)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(listing_id)
        .bind(&plan.name)
        .bind(plan.bedrooms)
        .bind(plan.bathrooms)
        .bind(plan.monthly_rent)
        .bind(plan.square_feet)
        .bind(plan.available_from)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert floor plan '{}'", plan.name))?;
    }
    Ok(())
}
