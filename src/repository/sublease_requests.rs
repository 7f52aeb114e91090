// src/repository/sublease_requests.rs
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::types::common::{from_json_list, gender_from_column, to_json_list};
use crate::types::{ParsedRequestFilter, SubleaseRequest, SubleaseRequestInput};
use crate::utils::{like_pattern, page_bounds};

#[derive(Debug, sqlx::FromRow)]
struct SubleaseRequestRow {
    id: i64,
    owner_id: String,
    title: String,
    description: String,
    min_budget: Option<i64>,
    max_budget: i64,
    preferred_areas: String,
    move_in_date: NaiveDate,
    move_out_date: NaiveDate,
    bedrooms: Option<i64>,
    gender_preference: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubleaseRequestRow> for SubleaseRequest {
    fn from(row: SubleaseRequestRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            min_budget: row.min_budget,
            max_budget: row.max_budget,
            preferred_areas: from_json_list(&row.preferred_areas),
            move_in_date: row.move_in_date,
            move_out_date: row.move_out_date,
            bedrooms: row.bedrooms,
            gender_preference: gender_from_column(&row.gender_preference),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const REQUEST_COLUMNS: &str = "id, owner_id, title, description, min_budget, max_budget, \
    preferred_areas, move_in_date, move_out_date, bedrooms, gender_preference, is_active, \
    created_at, updated_at";

pub struct SubleaseRequestRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SubleaseRequestRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        input: &SubleaseRequestInput,
    ) -> Result<SubleaseRequest> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO sublease_requests (
                owner_id, title, description, min_budget, max_budget, preferred_areas,
                move_in_date, move_out_date, bedrooms, gender_preference, is_active,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(owner_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.min_budget)
        .bind(input.max_budget)
        .bind(to_json_list(&input.preferred_areas))
        .bind(input.move_in_date)
        .bind(input.move_out_date)
        .bind(input.bedrooms)
        .bind(input.gender_preference.as_str())
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .context("Failed to insert sublease request")?;

        let id = result.last_insert_rowid();
        app_log!(info, "Created sublease request {} for owner {}", id, owner_id);

        self.find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Sublease request {} vanished after insert", id))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<SubleaseRequest>> {
        let row = sqlx::query_as::<_, SubleaseRequestRow>(&format!(
            "SELECT {} FROM sublease_requests WHERE id = ?",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(SubleaseRequest::from))
    }

    pub async fn update(
        &self,
        id: i64,
        input: &SubleaseRequestInput,
    ) -> Result<Option<SubleaseRequest>> {
        let result = sqlx::query(
            r#"
            UPDATE sublease_requests SET
                title = ?, description = ?, min_budget = ?, max_budget = ?, preferred_areas = ?,
                move_in_date = ?, move_out_date = ?, bedrooms = ?, gender_preference = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.min_budget)
        .bind(input.max_budget)
        .bind(to_json_list(&input.preferred_areas))
        .bind(input.move_in_date)
        .bind(input.move_out_date)
        .bind(input.bedrooms)
        .bind(input.gender_preference.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to update sublease request {}", id))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sublease_requests WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SubleaseRequest>> {
        let rows = sqlx::query_as::<_, SubleaseRequestRow>(&format!(
            "SELECT {} FROM sublease_requests WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
            REQUEST_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(SubleaseRequest::from).collect())
    }

    /// Active requests, newest first
    pub async fn search(&self, filter: &ParsedRequestFilter) -> Result<Vec<SubleaseRequest>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM sublease_requests WHERE is_active = TRUE",
            REQUEST_COLUMNS
        ));

        if let Some(budget) = filter.budget {
            qb.push(" AND max_budget >= ")
                .push_bind(budget)
                .push(" AND (min_budget IS NULL OR min_budget <= ")
                .push_bind(budget)
                .push(")");
        }
        if let Some(area) = &filter.area {
            qb.push(
                " AND EXISTS (SELECT 1 FROM json_each(sublease_requests.preferred_areas) \
                 WHERE lower(json_each.value) LIKE ",
            )
            .push_bind(like_pattern(area))
            .push(" ESCAPE '\\')");
        }
        if let Some(after) = filter.move_in_after {
            qb.push(" AND move_in_date >= ").push_bind(after);
        }
        if let Some(before) = filter.move_in_before {
            qb.push(" AND move_in_date <= ").push_bind(before);
        }

        let (limit, offset) = page_bounds(filter.limit, filter.offset);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build_query_as::<SubleaseRequestRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to search sublease requests")?;

        Ok(rows.into_iter().map(SubleaseRequest::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::UserRepository;
    use crate::core::database::test_support::temp_database;
    use crate::types::{GenderPreference, RequestFilter};

    fn input(max_budget: i64, areas: &[&str], move_in: (u32, u32)) -> SubleaseRequestInput {
        SubleaseRequestInput {
            title: "Looking for a room".into(),
            description: String::new(),
            min_budget: Some(400),
            max_budget,
            preferred_areas: areas.iter().map(|a| a.to_string()).collect(),
            move_in_date: NaiveDate::from_ymd_opt(2025, move_in.0, move_in.1).unwrap(),
            move_out_date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
            bedrooms: None,
            gender_preference: GenderPreference::Any,
        }
    }

    #[tokio::test]
    async fn test_request_search_filters() {
        let db = temp_database().await;
        UserRepository::new(db.pool())
            .upsert_on_login("seeker", "seek1@psu.edu", None)
            .await
            .unwrap();
        let repo = SubleaseRequestRepository::new(db.pool());

        let downtown = repo
            .create("seeker", &input(700, &["Downtown"], (8, 15)))
            .await
            .unwrap();
        let vairo = repo
            .create("seeker", &input(1000, &["Vairo Blvd"], (6, 1)))
            .await
            .unwrap();

        let parsed = RequestFilter {
            budget: Some(850),
            ..Default::default()
        }
        .parse()
        .unwrap();
        let found = repo.search(&parsed).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, vairo.id);

        let parsed = RequestFilter {
            area: Some("down".into()),
            move_in_after: Some("2025-08-01".into()),
            ..Default::default()
        }
        .parse()
        .unwrap();
        let found = repo.search(&parsed).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, downtown.id);

        let updated = repo
            .update(downtown.id, &input(750, &["Downtown", "College Heights"], (8, 15)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.preferred_areas.len(), 2);
        assert_eq!(repo.list_by_owner("seeker").await.unwrap().len(), 2);
        assert!(repo.delete(vairo.id).await.unwrap());
        assert!(!repo.delete(vairo.id).await.unwrap());
    }
}
