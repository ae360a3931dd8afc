use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::model::{AirQualityRecord, AqiStatus, City};

use super::{AirQualityProvider, ProviderId, UpstreamError, http_client};

const BASE_URL: &str = "https://api.airvisual.com/v2";

/// Client for the IQAir (AirVisual) nearest-city feed. Preferred source for
/// the region; resolves a coordinate pair to the closest monitored city.
#[derive(Debug, Clone)]
pub struct IqAirClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl IqAirClient {
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

    async fn fetch_nearest(&self, lat: f64, lon: f64) -> Result<IqAirData, UpstreamError> {
        let url = format!("{}/nearest_city", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let body = res.text().await?;
        let envelope: IqAirEnvelope = serde_json::from_str(&body)?;

        if envelope.status != "success" {
            let message = envelope
                .data
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("IQAir API error")
                .to_string();
            return Err(UpstreamError::Envelope(message));
        }

        Ok(serde_json::from_value(envelope.data)?)
    }
}

/// Outer envelope: `data` holds the payload on success and an error object
/// (with a `message`) on business-level failure.
#[derive(Debug, Deserialize)]
struct IqAirEnvelope {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct IqAirData {
    pub city: String,
    pub current: IqAirCurrent,
}

#[derive(Debug, Deserialize)]
pub struct IqAirCurrent {
    pub pollution: IqAirPollution,
}

#[derive(Debug, Deserialize)]
pub struct IqAirPollution {
    /// US EPA AQI.
    pub aqius: u32,
    /// Dominant pollutant on the US scale ("p2" = PM2.5).
    #[serde(default)]
    pub mainus: Option<String>,
    /// Reading timestamp.
    #[serde(default)]
    pub ts: Option<String>,
}

/// Map a nearest-city payload onto the canonical record shape.
pub fn normalize(city_id: &str, data: &IqAirData) -> AirQualityRecord {
    let pollution = &data.current.pollution;
    let aqi = pollution.aqius;

    // aqius is an index, not a µg/m³ concentration; the feed reports no
    // separate PM2.5 concentration, and the dashboard expects the index in
    // pm25 whenever PM2.5 is the dominant pollutant.
    let pm25 = (pollution.mainus.as_deref() == Some("p2")).then_some(f64::from(aqi));

    AirQualityRecord {
        city_id: city_id.to_owned(),
        aqi,
        status: AqiStatus::from_aqi(aqi),
        pm25,
        pm10: None,
        o3: None,
        no2: None,
        so2: None,
        co: None,
        station: Some(data.city.clone()),
        source: ProviderId::IqAir,
        timestamp: pollution.ts.clone().unwrap_or_else(|| Utc::now().to_rfc3339()),
    }
}

#[async_trait]
impl AirQualityProvider for IqAirClient {
    fn id(&self) -> ProviderId {
        ProviderId::IqAir
    }

    async fn fetch_city(&self, city: &City) -> Result<AirQualityRecord, UpstreamError> {
        let data = self.fetch_nearest(city.lat, city.lon).await?;
        let record = normalize(city.id, &data);
        debug!("iqair aqi for {}: {} from {}", city.id, record.aqi, data.city);
        Ok(record)
    }
}
