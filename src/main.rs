use std::net::SocketAddr;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod mailer;
#[cfg(test)]
mod memory;
mod reset;
mod response;
mod state;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gatekeep=debug,axum=info,tower_http=info".to_string());
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

    let app_state = AppState::init().await?;

    if let Some(pool) = app_state.pool() {
        sqlx::migrate!("./migrations").run(pool).await?;
        tracing::info!("migrations applied");
    }

    let addr: SocketAddr = format!(
        "{}:{}",
        app_state.config.app_host, app_state.config.app_port
    )
    .parse()?;

    app::serve(app::build_app(app_state), addr).await
}
