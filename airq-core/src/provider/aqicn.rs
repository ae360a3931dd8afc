use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::model::{AirQualityRecord, AqiStatus, City};

use super::{AirQualityProvider, ProviderId, UpstreamError, http_client};

const BASE_URL: &str = "https://api.waqi.info";

/// Client for the AQICN (World Air Quality Index) geo feed. Wider coverage
/// than IQAir; used as the fallback source.
#[derive(Debug, Clone)]
pub struct AqicnClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl AqicnClient {
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

    async fn fetch_feed(&self, lat: f64, lon: f64) -> Result<AqicnData, UpstreamError> {
        let url = format!("{}/feed/geo:{};{}/", self.base_url, lat, lon);

        let res = self
            .http
            .get(&url)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let body = res.text().await?;
        let envelope: AqicnEnvelope = serde_json::from_str(&body)?;

        if envelope.status != "ok" {
            return Err(UpstreamError::Envelope("AQICN data not available".to_string()));
        }

        Ok(serde_json::from_value(envelope.data)?)
    }
}

/// Outer envelope: on failure `data` degrades to a bare error string, so it
/// is kept untyped until the marker has been checked.
#[derive(Debug, Deserialize)]
struct AqicnEnvelope {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct AqicnData {
    /// AQI as reported: usually a number, sometimes a numeric string, "-"
    /// when the station is offline.
    #[serde(default)]
    pub aqi: serde_json::Value,
    #[serde(default)]
    pub iaqi: AqicnIaqi,
    #[serde(default)]
    pub city: Option<AqicnCity>,
    #[serde(default)]
    pub time: Option<AqicnTime>,
}

/// Per-pollutant sub-index block; every entry is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AqicnIaqi {
    #[serde(default)]
    pub pm25: Option<AqicnIndex>,
    #[serde(default)]
    pub pm10: Option<AqicnIndex>,
    #[serde(default)]
    pub o3: Option<AqicnIndex>,
    #[serde(default)]
    pub no2: Option<AqicnIndex>,
    #[serde(default)]
    pub so2: Option<AqicnIndex>,
    #[serde(default)]
    pub co: Option<AqicnIndex>,
}

#[derive(Debug, Deserialize)]
pub struct AqicnIndex {
    pub v: f64,
}

#[derive(Debug, Deserialize)]
pub struct AqicnCity {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AqicnTime {
    #[serde(default)]
    pub iso: Option<String>,
}

/// Map a geo feed payload onto the canonical record shape.
pub fn normalize(city_id: &str, data: &AqicnData) -> AirQualityRecord {
    let aqi = coerce_aqi(&data.aqi);

    AirQualityRecord {
        city_id: city_id.to_owned(),
        aqi,
        status: AqiStatus::from_aqi(aqi),
        pm25: data.iaqi.pm25.as_ref().map(|i| i.v),
        pm10: data.iaqi.pm10.as_ref().map(|i| i.v),
        o3: data.iaqi.o3.as_ref().map(|i| i.v),
        no2: data.iaqi.no2.as_ref().map(|i| i.v),
        so2: data.iaqi.so2.as_ref().map(|i| i.v),
        co: data.iaqi.co.as_ref().map(|i| i.v),
        station: data.city.as_ref().and_then(|c| c.name.clone()),
        source: ProviderId::Aqicn,
        timestamp: data
            .time
            .as_ref()
            .and_then(|t| t.iso.clone())
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    }
}

fn coerce_aqi(value: &serde_json::Value) -> u32 {
    match value {
        serde_json::Value::Number(n) => {
            let v = n.as_f64().unwrap_or(0.0);
            if v < 0.0 { 0 } else { v.round() as u32 }
        }
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[async_trait]
impl AirQualityProvider for AqicnClient {
    fn id(&self) -> ProviderId {
        ProviderId::Aqicn
    }

    async fn fetch_city(&self, city: &City) -> Result<AirQualityRecord, UpstreamError> {
        let data = self.fetch_feed(city.lat, city.lon).await?;
        let record = normalize(city.id, &data);
        debug!(
            "aqicn aqi for {}: {} from {}",
            city.id,
            record.aqi,
            record.station.as_deref().unwrap_or("unnamed station")
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cities;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn success_body(aqi: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "status": "ok",
            "data": {
                "aqi": aqi,
                "idx": 12711,
                "city": { "name": "Samarkand" },
                "iaqi": {
                    "pm25": { "v": 74.0 },
                    "pm10": { "v": 30.0 },
                    "o3": { "v": 12.0 },
                    "no2": { "v": 8.0 }
                },
                "time": { "iso": "2025-03-01T14:00:00+05:00" }
            }
        })
    }

    #[test]
    fn normalize_extracts_pollutant_sub_indices() {
        let data: AqicnData =
            serde_json::from_value(success_body(serde_json::json!(74))["data"].clone())
                .expect("payload");
        let record = normalize("samarkand", &data);

        assert_eq!(record.aqi, 74);
        assert_eq!(record.status, AqiStatus::Moderate);
        assert_eq!(record.pm25, Some(74.0));
        assert_eq!(record.pm10, Some(30.0));
        assert_eq!(record.o3, Some(12.0));
        assert_eq!(record.no2, Some(8.0));
        assert_eq!(record.so2, None);
        assert_eq!(record.co, None);
        assert_eq!(record.station.as_deref(), Some("Samarkand"));
        assert_eq!(record.source, ProviderId::Aqicn);
        assert_eq!(record.timestamp, "2025-03-01T14:00:00+05:00");
    }

    #[test]
    fn aqi_reported_as_numeric_string_is_parsed() {
        let data: AqicnData =
            serde_json::from_value(success_body(serde_json::json!("163"))["data"].clone())
                .expect("payload");
        let record = normalize("samarkand", &data);

        assert_eq!(record.aqi, 163);
        assert_eq!(record.status, AqiStatus::Poor);
    }

    #[test]
    fn unparsable_aqi_defaults_to_zero() {
        for bad in [serde_json::json!("-"), serde_json::json!(null), serde_json::json!({})] {
            let data: AqicnData =
                serde_json::from_value(success_body(bad)["data"].clone()).expect("payload");
            let record = normalize("samarkand", &data);

            assert_eq!(record.aqi, 0);
            assert_eq!(record.status, AqiStatus::Good);
        }
    }

    #[test]
    fn missing_city_and_time_fall_back() {
        let payload = serde_json::json!({ "aqi": 55 });
        let data: AqicnData = serde_json::from_value(payload).expect("payload");
        let record = normalize("nukus", &data);

        assert_eq!(record.station, None);
        assert!(!record.timestamp.is_empty());
    }

    #[tokio::test]
    async fn fetch_city_parses_a_successful_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("token", "TOKEN"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(success_body(serde_json::json!(88))),
            )
            .mount(&server)
            .await;

        let client = AqicnClient::with_base_url("TOKEN".to_string(), server.uri());
        let city = cities::find("samarkand").expect("registered");
        let record = client.fetch_city(city).await.expect("fetch");

        assert_eq!(record.city_id, "samarkand");
        assert_eq!(record.aqi, 88);
        assert_eq!(record.source, ProviderId::Aqicn);
    }

    #[tokio::test]
    async fn error_envelope_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "data": "Invalid key"
            })))
            .mount(&server)
            .await;

        let client = AqicnClient::with_base_url("TOKEN".to_string(), server.uri());
        let city = cities::find("samarkand").expect("registered");
        let err = client.fetch_city(city).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Envelope(_)));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = AqicnClient::with_base_url("TOKEN".to_string(), server.uri());
        let city = cities::find("samarkand").expect("registered");
        let err = client.fetch_city(city).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Status(_)));
    }
}
