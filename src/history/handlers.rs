use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::ApiJson,
    history::{dto::RecordSearchRequest, repo_types::SearchEntry, services},
    state::AppState,
};

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/weather-search", get(list_searches).post(record_search))
}

#[instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn list_searches(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SearchEntry>>, AppError> {
    Ok(Json(services::list_searches(&state, auth.user_id).await?))
}

#[instrument(skip(state, payload), fields(user_id = %auth.user_id))]
pub async fn record_search(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<RecordSearchRequest>,
) -> Result<(StatusCode, Json<SearchEntry>), AppError> {
    let entry = services::record_search(&state, auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
