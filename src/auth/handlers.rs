use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, SessionUser, SignupRequest,
            SignupResponse, UserSummary,
        },
        extractors::bearer_token,
        services,
    },
    error::AppError,
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let user = services::signup(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully",
            user: UserSummary::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.identifier.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username/email and password are required".into(),
        ));
    }

    let out = services::login(&state, &payload.identifier, &payload.password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful",
        token: out.token,
        expires_at: out.session.expires_at,
        user: SessionUser::from(&out.user),
    }))
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    services::logout(&state, bearer_token(&headers)).await?;
    Ok(Json(MessageResponse {
        message: "Logout successful",
    }))
}
