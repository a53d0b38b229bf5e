use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::{error::AppError, state::AppState, weather::gateway::parse_coordinates};

#[derive(Debug, Deserialize)]
pub struct MinutelyRainQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

pub fn weather_routes() -> Router<AppState> {
    Router::new().route("/minutely-rain", get(minutely_rain))
}

#[instrument(skip(state))]
pub async fn minutely_rain(
    State(state): State<AppState>,
    Query(q): Query<MinutelyRainQuery>,
) -> Result<Json<Value>, AppError> {
    let (lat, lon) = parse_coordinates(q.lat.as_deref(), q.lon.as_deref())?;
    let body = state.weather.fetch_minutely_precipitation(lat, lon).await?;
    Ok(Json(body))
}
