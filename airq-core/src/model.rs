use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Severity band for a US EPA AQI value.
///
/// Variants are declared in increasing severity, so the derived ordering
/// can be used to compare bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AqiStatus {
    Good,
    Moderate,
    Unhealthy,
    Poor,
    Hazardous,
}

impl AqiStatus {
    /// Classify an AQI value into its severity band.
    ///
    /// Every record served to the dashboard carries the band produced by
    /// this function; providers never supply their own classification.
    pub fn from_aqi(aqi: u32) -> Self {
        match aqi {
            0..=50 => AqiStatus::Good,
            51..=100 => AqiStatus::Moderate,
            101..=150 => AqiStatus::Unhealthy,
            151..=200 => AqiStatus::Poor,
            _ => AqiStatus::Hazardous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AqiStatus::Good => "good",
            AqiStatus::Moderate => "moderate",
            AqiStatus::Unhealthy => "unhealthy",
            AqiStatus::Poor => "poor",
            AqiStatus::Hazardous => "hazardous",
        }
    }
}

impl std::fmt::Display for AqiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored city. The registry in [`crate::cities`] is the only place
/// these are constructed.
#[derive(Debug, Clone, Copy)]
pub struct City {
    pub id: &'static str,
    pub lat: f64,
    pub lon: f64,
}

/// Canonical air quality record served to the dashboard, independent of
/// which provider produced it.
///
/// Pollutant sub-readings are provider-dependent and omitted from the JSON
/// body when absent; a missing reading is never rendered as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityRecord {
    pub city_id: String,
    pub aqi: u32,
    pub status: AqiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub so2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co: Option<f64>,
    /// Name of the reporting monitoring station, when the provider names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub source: ProviderId,
    /// ISO-8601 time of the reading itself, falling back to fetch time when
    /// the provider omits it.
    pub timestamp: String,
}
