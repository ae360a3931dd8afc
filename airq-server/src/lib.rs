//! Library portion of `airq-server`: application state and router
//! assembly, kept out of `main` so integration tests can stand up the full
//! HTTP surface in-process.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use airq_core::{Aggregator, Config, WeatherClient};

pub mod api;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    /// Absent when `OPENWEATHER_API_KEY` is not configured; the weather
    /// endpoints then answer with a configuration error.
    pub weather: Option<Arc<WeatherClient>>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, weather: Option<WeatherClient>) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            weather: weather.map(Arc::new),
        }
    }

    /// State with the provider chain, cache and weather client implied by
    /// the environment configuration.
    pub fn from_config(config: &Config) -> Self {
        let weather = config.openweather_api_key.clone().map(WeatherClient::new);
        Self::new(Aggregator::from_config(config), weather)
    }
}

/// Assemble the full API router. The dashboard front end is served from a
/// different origin, hence the permissive CORS layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(api::health::health_check))
        .route("/api/air-quality", get(api::air_quality::get_all))
        .route("/api/air-quality/:city_id", get(api::air_quality::get_city))
        .route("/api/weather", get(api::weather::get_all))
        .route("/api/weather/:city_id", get(api::weather::get_city))
        .route("/api/weather/:city_id/uv", get(api::weather::get_uv))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
