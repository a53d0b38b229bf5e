use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    alerts::{
        dto::{
            CheckAlertsRequest, CreateAlertRequest, EvaluationOutcome, ListAlertsQuery,
            UpdateAlertRequest,
        },
        repo_types::Alert,
        services,
    },
    auth::AuthUser,
    error::AppError,
    extract::ApiJson,
    state::AppState,
    weather::WeatherSnapshot,
};

pub fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/weather-alerts", get(list_alerts).post(create_alert))
        .route("/weather-alerts/check", post(check_alerts))
        .route(
            "/weather-alerts/:id",
            get(get_alert)
                .put(update_alert)
                .patch(update_alert)
                .delete(delete_alert),
        )
        .route("/weather-alerts/:id/evaluate", post(evaluate_alert))
}

/// Malformed ids cannot name an alert the caller owns.
fn alert_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

#[instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn list_alerts(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<ListAlertsQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let alerts = services::list_alerts(&state, auth.user_id, q.include_inactive).await?;
    Ok(Json(alerts))
}

#[instrument(skip(state, payload), fields(user_id = %auth.user_id))]
pub async fn create_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CreateAlertRequest>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    let alert = services::create_alert(&state, auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn get_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Alert>, AppError> {
    let alert = services::get_alert(&state, auth.user_id, alert_id(&id)?).await?;
    Ok(Json(alert))
}

#[instrument(skip(state, payload), fields(user_id = %auth.user_id))]
pub async fn update_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateAlertRequest>,
) -> Result<Json<Alert>, AppError> {
    let alert = services::update_alert(&state, auth.user_id, alert_id(&id)?, payload).await?;
    Ok(Json(alert))
}

#[instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn delete_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    services::delete_alert(&state, auth.user_id, alert_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, snapshot), fields(user_id = %auth.user_id))]
pub async fn evaluate_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(snapshot): ApiJson<WeatherSnapshot>,
) -> Result<Json<EvaluationOutcome>, AppError> {
    let outcome = services::evaluate_alert(&state, auth.user_id, alert_id(&id)?, &snapshot).await?;
    Ok(Json(outcome))
}

#[instrument(skip(state, payload), fields(user_id = %auth.user_id))]
pub async fn check_alerts(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CheckAlertsRequest>,
) -> Result<Json<Vec<EvaluationOutcome>>, AppError> {
    if payload.city.trim().is_empty() {
        return Err(AppError::BadRequest("city is required".into()));
    }
    let outcomes =
        services::check_city(&state, auth.user_id, &payload.city, &payload.weather).await?;
    Ok(Json(outcomes))
}
