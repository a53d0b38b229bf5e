use crate::state::AppState;
use axum::Router;

pub mod dispatcher;
mod dto;
pub mod handlers;
pub mod mailer;
pub mod templates;

pub use dispatcher::{AlertNotice, DispatchError, NotificationDispatcher};

pub fn router() -> Router<AppState> {
    handlers::notify_routes()
}
