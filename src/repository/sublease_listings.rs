// src/repository/sublease_listings.rs
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::types::common::{from_json_list, gender_from_column, to_json_list};
use crate::types::{
    GenderPreference, ListingSort, ParsedListingFilter, SubleaseListing, SubleaseListingInput,
    SubleaseRequest,
};
use crate::utils::{like_pattern, page_bounds};

#[derive(Debug, sqlx::FromRow)]
struct SubleaseListingRow {
    id: i64,
    owner_id: String,
    title: String,
    description: String,
    property_name: Option<String>,
    address: String,
    area: Option<String>,
    monthly_rent: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    bedrooms: i64,
    bathrooms: f64,
    furnished: bool,
    utilities_included: bool,
    gender_preference: String,
    amenities: String,
    image_urls: String,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubleaseListingRow> for SubleaseListing {
    fn from(row: SubleaseListingRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            property_name: row.property_name,
            address: row.address,
            area: row.area,
            monthly_rent: row.monthly_rent,
            start_date: row.start_date,
            end_date: row.end_date,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            furnished: row.furnished,
            utilities_included: row.utilities_included,
            gender_preference: gender_from_column(&row.gender_preference),
            amenities: from_json_list(&row.amenities),
            image_urls: from_json_list(&row.image_urls),
            contact_email: row.contact_email,
            contact_phone: row.contact_phone,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const LISTING_COLUMNS: &str = "id, owner_id, title, description, property_name, address, area, \
    monthly_rent, start_date, end_date, bedrooms, bathrooms, furnished, utilities_included, \
    gender_preference, amenities, image_urls, contact_email, contact_phone, is_active, \
    created_at, updated_at";

pub struct SubleaseListingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SubleaseListingRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        input: &SubleaseListingInput,
    ) -> Result<SubleaseListing> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO sublease_listings (
                owner_id, title, description, property_name, address, area, monthly_rent,
                start_date, end_date, bedrooms, bathrooms, furnished, utilities_included,
                gender_preference, amenities, image_urls, contact_email, contact_phone,
                is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(owner_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.property_name)
        .bind(&input.address)
        .bind(&input.area)
        .bind(input.monthly_rent)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(input.furnished)
        .bind(input.utilities_included)
        .bind(input.gender_preference.as_str())
        .bind(to_json_list(&input.amenities))
        .bind(to_json_list(&input.image_urls))
        .bind(&input.contact_email)
        .bind(&input.contact_phone)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .context("Failed to insert sublease listing")?;

        let id = result.last_insert_rowid();
        app_log!(info, "Created sublease listing {} for owner {}", id, owner_id);

        self.find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Sublease listing {} vanished after insert", id))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<SubleaseListing>> {
        let row = sqlx::query_as::<_, SubleaseListingRow>(&format!(
            "SELECT {} FROM sublease_listings WHERE id = ?",
            LISTING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(SubleaseListing::from))
    }

    pub async fn update(
        &self,
        id: i64,
        input: &SubleaseListingInput,
    ) -> Result<Option<SubleaseListing>> {
        let result = sqlx::query(
            r#"
            UPDATE sublease_listings SET
                title = ?, description = ?, property_name = ?, address = ?, area = ?,
                monthly_rent = ?, start_date = ?, end_date = ?, bedrooms = ?, bathrooms = ?,
                furnished = ?, utilities_included = ?, gender_preference = ?, amenities = ?,
                image_urls = ?, contact_email = ?, contact_phone = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.property_name)
        .bind(&input.address)
        .bind(&input.area)
        .bind(input.monthly_rent)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(input.furnished)
        .bind(input.utilities_included)
        .bind(input.gender_preference.as_str())
        .bind(to_json_list(&input.amenities))
        .bind(to_json_list(&input.image_urls))
        .bind(&input.contact_email)
        .bind(&input.contact_phone)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to update sublease listing {}", id))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE sublease_listings SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(is_active)
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sublease_listings WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            app_log!(info, "Deleted sublease listing {}", id);
        }
        Ok(deleted)
    }

    /// All of one owner's listings, inactive ones included
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SubleaseListing>> {
        let rows = sqlx::query_as::<_, SubleaseListingRow>(&format!(
            "SELECT {} FROM sublease_listings WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
            LISTING_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(SubleaseListing::from).collect())
    }

    /// Active listings matching the filter
    pub async fn search(&self, filter: &ParsedListingFilter) -> Result<Vec<SubleaseListing>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM sublease_listings WHERE is_active = TRUE",
            LISTING_COLUMNS
        ));

        if let Some(min) = filter.min_price {
            qb.push(" AND monthly_rent >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND monthly_rent <= ").push_bind(max);
        }
        if let Some(bedrooms) = filter.bedrooms {
            qb.push(" AND bedrooms = ").push_bind(bedrooms);
        }
        if let Some(bathrooms) = filter.min_bathrooms {
            qb.push(" AND bathrooms >= ").push_bind(bathrooms);
        }
        if let Some(from) = filter.available_from {
            qb.push(" AND end_date >= ").push_bind(from);
        }
        if let Some(to) = filter.available_to {
            qb.push(" AND start_date <= ").push_bind(to);
        }
        if let Some(furnished) = filter.furnished {
            qb.push(" AND furnished = ").push_bind(furnished);
        }
        if let Some(gender) = filter.gender.filter(|g| *g != GenderPreference::Any) {
            qb.push(" AND gender_preference IN ('any', ")
                .push_bind(gender.as_str())
                .push(")");
        }
        if let Some(area) = &filter.area {
            qb.push(" AND lower(area) LIKE ")
                .push_bind(like_pattern(area))
                .push(" ESCAPE '\\'");
        }
        for amenity in &filter.amenities {
            qb.push(
                " AND EXISTS (SELECT 1 FROM json_each(sublease_listings.amenities) \
                 WHERE lower(json_each.value) = ",
            )
            .push_bind(amenity.to_lowercase())
            .push(")");
        }
        if let Some(q) = &filter.q {
            let pattern = like_pattern(q);
            qb.push(" AND (");
            for (i, column) in ["title", "description", "property_name", "address"]
                .iter()
                .enumerate()
            {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(format!("lower({}) LIKE ", column))
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
            qb.push(")");
        }

        qb.push(match filter.sort {
            ListingSort::Newest => " ORDER BY created_at DESC, id DESC",
            ListingSort::PriceAsc => " ORDER BY monthly_rent ASC, id DESC",
            ListingSort::PriceDesc => " ORDER BY monthly_rent DESC, id DESC",
            ListingSort::StartDate => " ORDER BY start_date ASC, id DESC",
        });

        let (limit, offset) = page_bounds(filter.limit, filter.offset);
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let rows = qb
            .build_query_as::<SubleaseListingRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to search sublease listings")?;

        Ok(rows.into_iter().map(SubleaseListing::from).collect())
    }

    /// Active listings satisfying a housing request
    pub async fn find_matches(&self, request: &SubleaseRequest) -> Result<Vec<SubleaseListing>> {
        let rows = sqlx::query_as::<_, SubleaseListingRow>(&format!(
            r#"
            SELECT {} FROM sublease_listings
            WHERE is_active = TRUE
              AND owner_id != ?
              AND monthly_rent <= ?
              AND start_date <= ?
              AND end_date >= ?
            ORDER BY monthly_rent ASC, id DESC
            "#,
            LISTING_COLUMNS
        ))
        .bind(&request.owner_id)
        .bind(request.max_budget)
        .bind(request.move_out_date)
        .bind(request.move_in_date)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(SubleaseListing::from)
            .filter(|listing| request.is_matched_by(listing))
            .collect())
    }
}
