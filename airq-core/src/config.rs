use std::env;

use tracing::warn;

use crate::provider::ProviderId;

/// Runtime configuration, read once from the environment at startup.
///
/// A missing provider key disables that provider rather than failing
/// startup: the server comes up with whatever capabilities are configured
/// and degrades the affected endpoints.
#[derive(Debug, Clone)]
pub struct Config {
    pub iqair_api_key: Option<String>,
    pub aqicn_api_key: Option<String>,
    pub openweather_api_key: Option<String>,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iqair_api_key: None,
            aqicn_api_key: None,
            openweather_api_key: None,
            port: Self::DEFAULT_PORT,
        }
    }
}

impl Config {
    pub const DEFAULT_PORT: u16 = 3001;

    /// Read configuration from the process environment.
    ///
    /// Recognized variables: `IQAIR_API_KEY`, `AQICN_API_KEY`,
    /// `OPENWEATHER_API_KEY`, `PORT`. Empty values count as absent.
    pub fn from_env() -> Self {
        Self {
            iqair_api_key: non_empty_var("IQAIR_API_KEY"),
            aqicn_api_key: non_empty_var("AQICN_API_KEY"),
            openweather_api_key: non_empty_var("OPENWEATHER_API_KEY"),
            port: port_from_env(),
        }
    }

    /// Returns the API key for an air quality provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        match provider_id {
            ProviderId::IqAir => self.iqair_api_key.as_deref(),
            ProviderId::Aqicn => self.aqicn_api_key.as_deref(),
        }
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// True when at least one air quality provider has a key.
    pub fn any_aqi_provider_configured(&self) -> bool {
        ProviderId::all().iter().any(|id| self.is_provider_configured(*id))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn port_from_env() -> u16 {
    match env::var("PORT") {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring non-numeric PORT value '{raw}'");
            Config::DEFAULT_PORT
        }),
        Err(_) => Config::DEFAULT_PORT,
    }
}
