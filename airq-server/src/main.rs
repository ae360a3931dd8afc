//! Binary crate for the air quality dashboard API server.
//!
//! This crate focuses on:
//! - Process startup (tracing, environment configuration)
//! - Wiring the aggregation core into the HTTP router
//! - Serving the dashboard's JSON API

use anyhow::Result;
use tracing::{info, warn};

use airq_core::Config;
use airq_server::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting airq-server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();

    if !config.any_aqi_provider_configured() {
        warn!("no air quality provider key configured; /api/air-quality will return errors");
    }
    if config.openweather_api_key.is_none() {
        warn!("OPENWEATHER_API_KEY not set; /api/weather will return errors");
    }

    let state = AppState::from_config(&config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("listening on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
