//! Weather endpoints: single-provider fetches, no cache or fallback.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use airq_core::{UvReport, WeatherReport, cities};

use crate::AppState;

#[derive(Debug)]
pub enum WeatherApiError {
    NotConfigured,
    UnknownCity,
    Upstream,
}

impl IntoResponse for WeatherApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WeatherApiError::NotConfigured => {
                (StatusCode::INTERNAL_SERVER_ERROR, "OpenWeather API key not configured")
            }
            WeatherApiError::UnknownCity => (StatusCode::NOT_FOUND, "City not found"),
            WeatherApiError::Upstream => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch weather data")
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// GET /api/weather/:city_id
pub async fn get_city(
    State(state): State<AppState>,
    Path(city_id): Path<String>,
) -> Result<Json<WeatherReport>, WeatherApiError> {
    let client = state.weather.as_ref().ok_or(WeatherApiError::NotConfigured)?;
    let city = cities::find(&city_id).ok_or(WeatherApiError::UnknownCity)?;

    let report = client.current(city).await.map_err(|err| {
        warn!("weather fetch failed for {city_id}: {err}");
        WeatherApiError::Upstream
    })?;

    Ok(Json(report))
}

/// GET /api/weather/:city_id/uv
pub async fn get_uv(
    State(state): State<AppState>,
    Path(city_id): Path<String>,
) -> Result<Json<UvReport>, WeatherApiError> {
    let client = state.weather.as_ref().ok_or(WeatherApiError::NotConfigured)?;
    let city = cities::find(&city_id).ok_or(WeatherApiError::UnknownCity)?;

    let report = client.uv(city).await.map_err(|err| {
        warn!("uv fetch failed for {city_id}: {err}");
        WeatherApiError::Upstream
    })?;

    Ok(Json(report))
}

/// GET /api/weather
pub async fn get_all(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeatherReport>>, WeatherApiError> {
    let client = state.weather.as_ref().ok_or(WeatherApiError::NotConfigured)?;
    Ok(Json(client.all_cities().await))
}
