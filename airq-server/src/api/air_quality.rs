//! Air quality endpoints: per-city and bulk records.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use airq_core::{AggregateError, AirQualityRecord};

use crate::AppState;

/// Aggregator failures mapped onto the dashboard's error contract.
///
/// The body carries a generic message only; upstream detail stays in the
/// server logs, never in a response.
#[derive(Debug)]
pub struct AirQualityError(AggregateError);

impl From<AggregateError> for AirQualityError {
    fn from(err: AggregateError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AirQualityError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AggregateError::UnknownCity(_) => (StatusCode::NOT_FOUND, "City not found"),
            AggregateError::NoProviderAvailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "No AQI API configured or available")
            }
            AggregateError::NoProviderConfigured => {
                (StatusCode::INTERNAL_SERVER_ERROR, "No AQI API key configured")
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// GET /api/air-quality/:city_id
pub async fn get_city(
    State(state): State<AppState>,
    Path(city_id): Path<String>,
) -> Result<Json<AirQualityRecord>, AirQualityError> {
    let record = state.aggregator.city(&city_id).await?;
    Ok(Json(record))
}

/// GET /api/air-quality
///
/// Whole-registry sweep; cities whose resolution failed are absent from the
/// array rather than rendered as zeroes.
pub async fn get_all(
    State(state): State<AppState>,
) -> Result<Json<Vec<AirQualityRecord>>, AirQualityError> {
    let records = state.aggregator.all_cities().await?;
    Ok(Json(records))
}
