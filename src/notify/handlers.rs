use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::dto::MessageResponse,
    error::AppError,
    extract::ApiJson,
    notify::{
        dispatcher::AlertNotice,
        dto::{SendAlertEmailRequest, SendTestEmailRequest},
    },
    state::AppState,
};

pub fn notify_routes() -> Router<AppState> {
    Router::new()
        .route("/send-alert-email", post(send_alert_email))
        .route("/send-test-email", post(send_test_email))
}

#[instrument(skip(state, payload))]
pub async fn send_alert_email(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SendAlertEmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let recipient = payload.user_email.unwrap_or_default();
    let notice = AlertNotice::from(payload.alert);
    state
        .dispatcher
        .send_alert_notification(&recipient, &notice, &payload.weather_data)
        .await?;
    Ok(Json(MessageResponse {
        message: "Alert email sent successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn send_test_email(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SendTestEmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let recipient = payload.user_email.unwrap_or_default();
    state.dispatcher.send_test_notification(&recipient).await?;
    Ok(Json(MessageResponse {
        message: "Test email sent successfully",
    }))
}
