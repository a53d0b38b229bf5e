use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One city lookup with the conditions seen at the time. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SearchEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub city: String,
    pub country: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<i32>,
    pub pressure: Option<i32>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub searched_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct NewSearch {
    pub city: String,
    pub country: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<i32>,
    pub pressure: Option<i32>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
}
