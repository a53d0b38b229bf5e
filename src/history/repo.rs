use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::history::repo_types::{NewSearch, SearchEntry};

/// Append-only search log, scoped by owner.
#[async_trait]
pub trait SearchHistoryStore: Send + Sync {
    async fn append(&self, owner: Uuid, entry: NewSearch) -> StoreResult<SearchEntry>;
    /// Newest first.
    async fn list(&self, owner: Uuid) -> StoreResult<Vec<SearchEntry>>;
}

const SEARCH_COLUMNS: &str = "id, user_id, city, country, temperature, humidity, pressure, \
     wind_speed, description, searched_at";

pub struct PgSearchHistoryStore {
    db: PgPool,
}

impl PgSearchHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SearchHistoryStore for PgSearchHistoryStore {
    async fn append(&self, owner: Uuid, entry: NewSearch) -> StoreResult<SearchEntry> {
        let sql = format!(
            r#"
            INSERT INTO weather_searches
                (id, user_id, city, country, temperature, humidity, pressure, wind_speed, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SEARCH_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SearchEntry>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&entry.city)
            .bind(&entry.country)
            .bind(entry.temperature)
            .bind(entry.humidity)
            .bind(entry.pressure)
            .bind(entry.wind_speed)
            .bind(&entry.description)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<SearchEntry>> {
        let sql = format!(
            "SELECT {SEARCH_COLUMNS} FROM weather_searches WHERE user_id = $1 ORDER BY searched_at DESC"
        );
        let rows = sqlx::query_as::<_, SearchEntry>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }
}
