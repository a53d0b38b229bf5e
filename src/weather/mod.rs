use crate::state::AppState;
use axum::Router;

pub mod gateway;
pub mod handlers;
pub mod snapshot;

pub use gateway::{GatewayError, WeatherGateway};
pub use snapshot::WeatherSnapshot;

pub fn router() -> Router<AppState> {
    handlers::weather_routes()
}
