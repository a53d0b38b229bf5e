use std::sync::Arc;

mod alerts;
mod app;
mod auth;
mod config;
mod error;
mod extract;
mod history;
#[cfg(test)]
mod memory;
mod notify;
mod profile;
mod state;
mod weather;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "weatherdash=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let db = AppState::connect(&config).await?;

    sqlx::migrate!("./migrations").run(&db).await?;

    let state = AppState::from_parts(db, config)?;
    app::serve(app::build_app(state)).await
}
