// src/repository/facebook_listings.rs
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::types::common::{from_json_list, gender_from_column, to_json_list};
use crate::types::{
    ExtractionMethod, FacebookListing, GenderPreference, ListingSort, NewFacebookListing,
    ParsedListingFilter,
};
use crate::utils::{like_pattern, page_bounds};

const DEFAULT_TITLE: &str = "Sublease from Facebook";

#[derive(Debug, sqlx::FromRow)]
struct FacebookListingRow {
    id: i64,
    submitted_by: Option<String>,
    post_url: Option<String>,
    author_name: Option<String>,
    post_text: String,
    ocr_text: Option<String>,
    image_paths: String,
    title: String,
    monthly_rent: Option<i64>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    bedrooms: Option<i64>,
    bathrooms: Option<f64>,
    property_name: Option<String>,
    address: Option<String>,
    amenities: String,
    special_requirements: String,
    gender_preference: String,
    furnished: Option<bool>,
    utilities_included: Option<bool>,
    contact: Option<String>,
    description: Option<String>,
    extraction_method: String,
    fallback_fields: String,
    raw_llm_response: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<FacebookListingRow> for FacebookListing {
    fn from(row: FacebookListingRow) -> Self {
        Self {
            id: row.id,
            submitted_by: row.submitted_by,
            post_url: row.post_url,
            author_name: row.author_name,
            post_text: row.post_text,
            ocr_text: row.ocr_text,
            image_paths: from_json_list(&row.image_paths),
            title: row.title,
            monthly_rent: row.monthly_rent,
            start_date: row.start_date,
            end_date: row.end_date,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            property_name: row.property_name,
            address: row.address,
            amenities: from_json_list(&row.amenities),
            special_requirements: from_json_list(&row.special_requirements),
            gender_preference: gender_from_column(&row.gender_preference),
            furnished: row.furnished,
            utilities_included: row.utilities_included,
            contact: row.contact,
            description: row.description,
            extraction_method: row
                .extraction_method
                .parse()
                .unwrap_or(ExtractionMethod::Heuristics),
            fallback_fields: from_json_list(&row.fallback_fields),
            raw_llm_response: row.raw_llm_response,
            created_at: row.created_at,
        }
    }
}

const FACEBOOK_COLUMNS: &str = "id, submitted_by, post_url, author_name, post_text, ocr_text, \
    image_paths, title, monthly_rent, start_date, end_date, bedrooms, bathrooms, property_name, \
    address, amenities, special_requirements, gender_preference, furnished, utilities_included, \
    contact, description, extraction_method, fallback_fields, raw_llm_response, created_at";

pub struct FacebookListingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FacebookListingRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, listing: &NewFacebookListing) -> Result<FacebookListing> {
        let fields = &listing.extraction.fields;
        let title = fields
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO facebook_listings (
                submitted_by, post_url, author_name, post_text, ocr_text, image_paths, title,
                monthly_rent, start_date, end_date, bedrooms, bathrooms, property_name, address,
                amenities, special_requirements, gender_preference, furnished, utilities_included,
                contact, description, extraction_method, fallback_fields, raw_llm_response,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&listing.submitted_by)
        .bind(&listing.post_url)
        .bind(&listing.author_name)
        .bind(&listing.post_text)
        .bind(&listing.extraction.ocr_text)
        .bind(to_json_list(&listing.image_paths))
        .bind(&title)
        .bind(fields.monthly_rent)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(fields.bedrooms)
        .bind(fields.bathrooms)
        .bind(&fields.property_name)
        .bind(&fields.address)
        .bind(to_json_list(&fields.amenities))
        .bind(to_json_list(&fields.special_requirements))
        .bind(fields.gender_preference.unwrap_or_default().as_str())
        .bind(fields.furnished)
        .bind(fields.utilities_included)
        .bind(&fields.contact)
        .bind(&fields.description)
        .bind(listing.extraction.method.as_str())
        .bind(to_json_list(&listing.extraction.fallback_fields))
        .bind(&listing.extraction.raw_llm_response)
        .bind(Utc::now())
        .execute(self.pool)
        .await
        .context("Failed to insert facebook listing")?;

        let id = result.last_insert_rowid();
        app_log!(
            info,
            "Stored facebook listing {} via {} ({} fallback fields)",
            id,
            listing.extraction.method.as_str(),
            listing.extraction.fallback_fields.len()
        );

        self.find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Facebook listing {} vanished after insert", id))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<FacebookListing>> {
        let row = sqlx::query_as::<_, FacebookListingRow>(&format!(
            "SELECT {} FROM facebook_listings WHERE id = ?",
            FACEBOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(FacebookListing::from))
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM facebook_listings WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rows missing a filtered field are excluded
    pub async fn search(&self, filter: &ParsedListingFilter) -> Result<Vec<FacebookListing>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM facebook_listings WHERE 1 = 1",
            FACEBOOK_COLUMNS
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
            let pattern = like_pattern(area);
            qb.push(" AND (lower(address) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(property_name) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        for amenity in &filter.amenities {
            qb.push(
                " AND EXISTS (SELECT 1 FROM json_each(facebook_listings.amenities) \
                 WHERE lower(json_each.value) = ",
            )
            .push_bind(amenity.to_lowercase())
            .push(")");
        }
        if let Some(q) = &filter.q {
            let pattern = like_pattern(q);
            qb.push(" AND (lower(title) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(post_text) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        qb.push(match filter.sort {
            ListingSort::Newest => " ORDER BY created_at DESC, id DESC",
            ListingSort::PriceAsc => " ORDER BY monthly_rent IS NULL, monthly_rent ASC, id DESC",
            ListingSort::PriceDesc => " ORDER BY monthly_rent IS NULL, monthly_rent DESC, id DESC",
            ListingSort::StartDate => " ORDER BY start_date IS NULL, start_date ASC, id DESC",
        });

        let (limit, offset) = page_bounds(filter.limit, filter.offset);
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let rows = qb
            .build_query_as::<FacebookListingRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to search facebook listings")?;

        Ok(rows.into_iter().map(FacebookListing::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::test_support::temp_database;
    use crate::types::{ExtractedFields, ExtractionResult, ListingFilter};

    fn new_listing(rent: Option<i64>, method: ExtractionMethod) -> NewFacebookListing {
        NewFacebookListing {
            submitted_by: Some("u1".into()),
            post_url: Some("https://facebook.com/groups/psu/posts/1".into()),
            author_name: Some("Jordan".into()),
            post_text: "Subleasing my room at The Rise".into(),
            image_paths: vec!["data/uploads/a.png".into()],
            extraction: ExtractionResult {
                fields: ExtractedFields {
                    monthly_rent: rent,
                    bedrooms: Some(4),
                    amenities: vec!["Gym".into()],
                    special_requirements: vec!["Female only".into()],
                    gender_preference: Some(GenderPreference::Female),
                    ..Default::default()
                },
                method,
                fallback_fields: vec!["price".into()],
                ocr_text: None,
                raw_llm_response: Some("{}".into()),
            },
        }
    }

    #[tokio::test]
    async fn test_insert_and_filter() {
        let db = temp_database().await;
        let repo = FacebookListingRepository::new(db.pool());

        let stored = repo
            .insert(&new_listing(Some(650), ExtractionMethod::LlmWithHeuristics))
            .await
            .unwrap();
        assert_eq!(stored.title, DEFAULT_TITLE);
        assert_eq!(stored.extraction_method, ExtractionMethod::LlmWithHeuristics);
        assert_eq!(stored.fallback_fields, vec!["price".to_string()]);
        assert_eq!(stored.gender_preference, GenderPreference::Female);

        repo.insert(&new_listing(None, ExtractionMethod::Heuristics))
            .await
            .unwrap();

        let cheap = ListingFilter {
            max_price: Some(700),
            ..Default::default()
        }
        .parse()
        .unwrap();
        let found = repo.search(&cheap).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stored.id);

        let all = repo.search(&ListingFilter { ..Default::default() }.parse().unwrap()).await.unwrap();
        assert_eq!(all.len(), 2);

        let mut at_the_rise = new_listing(Some(900), ExtractionMethod::Heuristics);
        at_the_rise.extraction.fields.property_name = Some("The Rise".into());
        at_the_rise.extraction.fields.amenities = vec!["Pool".into(), "Gym".into()];
        let rise = repo.insert(&at_the_rise).await.unwrap();

        let by_area = ListingFilter {
            area: Some("rise".into()),
            ..Default::default()
        }
        .parse()
        .unwrap();
        let found = repo.search(&by_area).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, rise.id);

        let with_pool = ListingFilter {
            amenities: Some("pool, gym".into()),
            ..Default::default()
        }
        .parse()
        .unwrap();
        let found = repo.search(&with_pool).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, rise.id);

        let gym_only = ListingFilter {
            amenities: Some("Gym".into()),
            ..Default::default()
        }
        .parse()
        .unwrap();
        assert_eq!(repo.search(&gym_only).await.unwrap().len(), 3);

        assert!(repo.delete(stored.id).await.unwrap());
        assert!(repo.find_by_id(stored.id).await.unwrap().is_none());
    }
}
