use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::ApiJson,
    profile::{
        dto::{ProfileResponse, UpdateProfileRequest},
        services,
    },
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route(
        "/profile",
        get(get_profile).put(update_profile).patch(update_profile),
    )
}

#[instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = services::get_profile(&state, auth.user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload), fields(user_id = %auth.user_id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = services::update_profile(&state, auth.user_id, payload).await?;
    Ok(Json(user.into()))
}
