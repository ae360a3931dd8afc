//! OpenWeather fetchers for the dashboard's weather panels.
//!
//! Unlike air quality there is a single provider here, so no fallback chain
//! and no cache: the dashboard polls these endpoints at a leisurely rate
//! and OpenWeather's quota tolerates it.

use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cities;
use crate::model::City;
use crate::provider::{UpstreamError, http_client};

const BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Current conditions for one city, in the dashboard's JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub city_id: String,
    /// Celsius, one decimal.
    pub temperature: f64,
    pub humidity: u8,
    /// Meters per second, one decimal.
    pub wind: f64,
    /// Hectopascals.
    pub pressure: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub timestamp: String,
}

/// UV index reading for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UvReport {
    pub city_id: String,
    pub uv: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    /// Client pointed at an alternative endpoint; tests aim this at a mock
    /// server.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: http_client(),
        }
    }

    /// Current conditions for one city.
    pub async fn current(&self, city: &City) -> Result<WeatherReport, UpstreamError> {
        let url = format!("{}/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", city.lat.to_string()),
                ("lon", city.lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let body = res.text().await?;
        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;

        Ok(WeatherReport {
            city_id: city.id.to_owned(),
            temperature: round1(parsed.main.temp),
            humidity: parsed.main.humidity,
            wind: round1(parsed.wind.speed),
            pressure: parsed.main.pressure,
            description: parsed.weather.first().map(|w| w.description.clone()),
            icon: parsed.weather.first().map(|w| w.icon.clone()),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// UV index for one city, from the One Call endpoint.
    pub async fn uv(&self, city: &City) -> Result<UvReport, UpstreamError> {
        let url = format!("{}/onecall", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", city.lat.to_string()),
                ("lon", city.lon.to_string()),
                ("appid", self.api_key.clone()),
                ("exclude", "minutely,hourly,daily,alerts".to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let body = res.text().await?;
        let parsed: OwOneCallResponse = serde_json::from_str(&body)?;

        Ok(UvReport {
            city_id: city.id.to_owned(),
            uv: round1(parsed.current.uvi),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Current conditions for the whole registry, fetched concurrently.
    /// Cities whose fetch fails are left out.
    pub async fn all_cities(&self) -> Vec<WeatherReport> {
        let fetches = cities::CITIES.iter().map(|city| async move {
            match self.current(city).await {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!("weather fetch failed for {}: {}", city.id, err);
                    None
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwOneCallCurrent {
    uvi: f64,
}

#[derive(Debug, Deserialize)]
struct OwOneCallResponse {
    current: OwOneCallCurrent,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
