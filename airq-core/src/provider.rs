use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Config,
    model::{AirQualityRecord, City},
    provider::{aqicn::AqicnClient, iqair::IqAirClient},
};

pub mod aqicn;
pub mod iqair;

/// Bound on every outbound provider call; a hung upstream must not stall a
/// city's resolution indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    IqAir,
    Aqicn,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::IqAir => "iqair",
            ProviderId::Aqicn => "aqicn",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::IqAir, ProviderId::Aqicn]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single upstream call.
///
/// Clients never retry; whether to fall back to another provider is the
/// aggregator's decision.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    /// The transport succeeded but the body's success marker says otherwise
    /// (HTTP 200 carrying a business-logic error).
    #[error("provider rejected the request: {0}")]
    Envelope(String),

    #[error("failed to decode provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One upstream air quality data source.
#[async_trait]
pub trait AirQualityProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Fetch the current reading for a city and normalize it into the
    /// canonical record shape. Performs exactly one upstream request.
    async fn fetch_city(&self, city: &City) -> Result<AirQualityRecord, UpstreamError>;
}

/// Build the ordered fallback chain from the configured API keys.
///
/// IQAir comes first, AQICN second; a provider without a key is left out of
/// the chain entirely. Adding a provider means adding an entry here, not
/// changing the aggregator.
pub fn providers_from_config(config: &Config) -> Vec<Box<dyn AirQualityProvider>> {
    let mut providers: Vec<Box<dyn AirQualityProvider>> = Vec::new();

    if let Some(api_key) = config.provider_api_key(ProviderId::IqAir) {
        providers.push(Box::new(IqAirClient::new(api_key.to_owned())));
    }
    if let Some(api_key) = config.provider_api_key(ProviderId::Aqicn) {
        providers.push(Box::new(AqicnClient::new(api_key.to_owned())));
    }

    providers
}

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}
