//! Cache-first aggregation over the ordered provider fallback chain.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    Config,
    cache::AqiCache,
    cities,
    model::AirQualityRecord,
    provider::{self, AirQualityProvider},
};

/// Terminal failures of an aggregation request.
///
/// Individual provider failures never surface here: they are absorbed into
/// the fallback chain and reported only once the whole chain is exhausted,
/// so upstream error formats cannot leak to callers.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("unknown city '{0}'")]
    UnknownCity(String),

    /// No provider has an API key at all; distinct from
    /// [`AggregateError::NoProviderAvailable`] so operators can tell
    /// misconfiguration from an upstream outage.
    #[error("no air quality provider is configured")]
    NoProviderConfigured,

    #[error("all providers failed for city '{0}'")]
    NoProviderAvailable(String),
}

/// Pause inserted after each uncached city during a bulk run, keeping a full
/// sweep of the registry under upstream rate limits.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    delay: Duration,
}

impl Pacing {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// No pauses at all; test configurations use this to run deterministically.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

/// Resolves per-city records: cache first, then the provider chain in
/// order, writing fresh results through to the cache.
///
/// Holds no record state of its own between calls; the cache owns every
/// record it returns from a previous fetch.
#[derive(Debug)]
pub struct Aggregator {
    providers: Vec<Box<dyn AirQualityProvider>>,
    cache: AqiCache,
    pacing: Pacing,
}

impl Aggregator {
    pub fn new(
        providers: Vec<Box<dyn AirQualityProvider>>,
        cache: AqiCache,
        pacing: Pacing,
    ) -> Self {
        Self {
            providers,
            cache,
            pacing,
        }
    }

    /// Aggregator with the provider chain implied by the configured API
    /// keys, the default cache TTL and default pacing.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            provider::providers_from_config(config),
            AqiCache::default(),
            Pacing::default(),
        )
    }

    /// Resolve the current record for one city.
    pub async fn city(&self, city_id: &str) -> Result<AirQualityRecord, AggregateError> {
        let city = cities::find(city_id)
            .ok_or_else(|| AggregateError::UnknownCity(city_id.to_owned()))?;

        if let Some(record) = self.cache.get(city.id).await {
            debug!("cache hit for {}: aqi {}", city.id, record.aqi);
            return Ok(record);
        }

        for provider in &self.providers {
            match provider.fetch_city(city).await {
                Ok(record) => {
                    self.cache.put(city.id, record.clone()).await;
                    return Ok(record);
                }
                Err(err) => {
                    warn!("{} failed for {}: {}", provider.id(), city.id, err);
                }
            }
        }

        Err(AggregateError::NoProviderAvailable(city_id.to_owned()))
    }

    /// Resolve every registry city, in registry order.
    ///
    /// Cities already cached are returned without touching upstream and
    /// without a pacing pause; every other city is followed by one pause,
    /// whether its fetch succeeded or not. Cities whose whole chain fails
    /// are left out of the result; a partial sweep is the normal steady
    /// state when a provider quota runs dry mid-run.
    pub async fn all_cities(&self) -> Result<Vec<AirQualityRecord>, AggregateError> {
        if self.providers.is_empty() {
            return Err(AggregateError::NoProviderConfigured);
        }

        let mut records = Vec::with_capacity(cities::CITIES.len());

        for city in cities::CITIES {
            if let Some(record) = self.cache.get(city.id).await {
                debug!("cache hit for {}: aqi {}", city.id, record.aqi);
                records.push(record);
                continue;
            }

            match self.city(city.id).await {
                Ok(record) => records.push(record),
                Err(err) => debug!("skipping {}: {}", city.id, err),
            }

            self.pacing.pause().await;
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::model::{AqiStatus, City};
    use crate::provider::{ProviderId, UpstreamError};

    /// Scripted provider: fails for the listed city ids, succeeds elsewhere.
    #[derive(Debug)]
    struct ScriptedProvider {
        id: ProviderId,
        aqi: u32,
        failing: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(id: ProviderId, aqi: u32) -> Self {
            Self {
                id,
                aqi,
                failing: Vec::new(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_for(mut self, city_ids: &[&'static str]) -> Self {
            self.failing = city_ids.to_vec();
            self
        }

        fn call_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl AirQualityProvider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch_city(&self, city: &City) -> Result<AirQualityRecord, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.failing.contains(&city.id) {
                return Err(UpstreamError::Envelope("scripted failure".to_string()));
            }

            Ok(AirQualityRecord {
                city_id: city.id.to_owned(),
                aqi: self.aqi,
                status: AqiStatus::from_aqi(self.aqi),
                pm25: None,
                pm10: None,
                o3: None,
                no2: None,
                so2: None,
                co: None,
                station: None,
                source: self.id,
                timestamp: "2025-03-01T09:00:00+05:00".to_string(),
            })
        }
    }

    fn aggregator(providers: Vec<Box<dyn AirQualityProvider>>) -> Aggregator {
        Aggregator::new(providers, AqiCache::default(), Pacing::none())
    }

    #[tokio::test]
    async fn unknown_city_never_reaches_a_provider() {
        let provider = ScriptedProvider::new(ProviderId::IqAir, 40);
        let calls = provider.call_counter();
        let agg = aggregator(vec![Box::new(provider)]);

        let err = agg.city("atlantis").await.unwrap_err();

        assert!(matches!(err, AggregateError::UnknownCity(ref id) if id == "atlantis"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_wins_when_healthy() {
        let secondary = ScriptedProvider::new(ProviderId::Aqicn, 90);
        let secondary_calls = secondary.call_counter();
        let agg = aggregator(vec![
            Box::new(ScriptedProvider::new(ProviderId::IqAir, 40)),
            Box::new(secondary),
        ]);

        let record = agg.city("tashkent").await.expect("resolved");

        assert_eq!(record.source, ProviderId::IqAir);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_primary_falls_back_to_secondary() {
        let primary = ScriptedProvider::new(ProviderId::IqAir, 40).failing_for(&["tashkent"]);
        let primary_calls = primary.call_counter();
        let agg = aggregator(vec![
            Box::new(primary),
            Box::new(ScriptedProvider::new(ProviderId::Aqicn, 90)),
        ]);

        let record = agg.city("tashkent").await.expect("resolved");

        assert_eq!(record.source, ProviderId::Aqicn);
        assert_eq!(record.aqi, 90);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_is_no_provider_available() {
        let agg = aggregator(vec![
            Box::new(ScriptedProvider::new(ProviderId::IqAir, 40).failing_for(&["tashkent"])),
            Box::new(ScriptedProvider::new(ProviderId::Aqicn, 90).failing_for(&["tashkent"])),
        ]);

        let err = agg.city("tashkent").await.unwrap_err();

        assert!(matches!(err, AggregateError::NoProviderAvailable(ref id) if id == "tashkent"));
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let provider = ScriptedProvider::new(ProviderId::IqAir, 40);
        let calls = provider.call_counter();
        let agg = aggregator(vec![Box::new(provider)]);

        let first = agg.city("tashkent").await.expect("resolved");
        let second = agg.city("tashkent").await.expect("resolved");

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_a_fresh_fetch() {
        let provider = ScriptedProvider::new(ProviderId::IqAir, 40);
        let calls = provider.call_counter();
        let agg = Aggregator::new(
            vec![Box::new(provider)],
            AqiCache::new(Duration::ZERO),
            Pacing::none(),
        );

        agg.city("tashkent").await.expect("resolved");
        agg.city("tashkent").await.expect("resolved");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bulk_fails_fast_without_providers() {
        let agg = aggregator(Vec::new());

        let err = agg.all_cities().await.unwrap_err();

        assert!(matches!(err, AggregateError::NoProviderConfigured));
    }

    #[tokio::test]
    async fn bulk_omits_failed_cities_and_keeps_registry_order() {
        let agg = aggregator(vec![Box::new(
            ScriptedProvider::new(ProviderId::IqAir, 40).failing_for(&["bukhara"]),
        )]);

        let records = agg.all_cities().await.expect("bulk");

        assert_eq!(records.len(), cities::CITIES.len() - 1);
        let expected: Vec<&str> = cities::CITIES
            .iter()
            .map(|c| c.id)
            .filter(|id| *id != "bukhara")
            .collect();
        let got: Vec<&str> = records.iter().map(|r| r.city_id.as_str()).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_paces_only_uncached_cities() {
        let agg = Aggregator::new(
            vec![Box::new(ScriptedProvider::new(ProviderId::IqAir, 40))],
            AqiCache::default(),
            Pacing::default(),
        );

        // Two cities resolved up front sit in the cache and must not incur
        // a pacing pause during the sweep.
        agg.city("tashkent").await.expect("resolved");
        agg.city("samarkand").await.expect("resolved");

        let started = tokio::time::Instant::now();
        let records = agg.all_cities().await.expect("bulk");
        let elapsed = started.elapsed();

        assert_eq!(records.len(), cities::CITIES.len());
        let uncached = (cities::CITIES.len() - 2) as u32;
        assert_eq!(elapsed, Pacing::DEFAULT_DELAY * uncached);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_paces_failed_fetches_too() {
        let agg = Aggregator::new(
            vec![Box::new(
                ScriptedProvider::new(ProviderId::IqAir, 40).failing_for(&["bukhara"]),
            )],
            AqiCache::default(),
            Pacing::default(),
        );

        let started = tokio::time::Instant::now();
        agg.all_cities().await.expect("bulk");
        let elapsed = started.elapsed();

        // Every city was uncached, including the failing one.
        assert_eq!(elapsed, Pacing::DEFAULT_DELAY * cities::CITIES.len() as u32);
    }
}
