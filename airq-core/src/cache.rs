//! Per-city cache of aggregated air quality records.
//!
//! Upstream quotas are tight, so every successful aggregation is kept for a
//! short time-to-live. Expiry is lazy: an aged entry is skipped on read and
//! superseded by the next successful fetch. The key space is bounded by the
//! city registry, so there is no eviction and no size bound.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::model::AirQualityRecord;

#[derive(Debug, Clone)]
struct CacheEntry {
    record: AirQualityRecord,
    fetched_at: Instant,
}

/// In-memory TTL cache. Constructed by whoever owns the aggregator; never a
/// process-wide singleton, so tests get a fresh cache per case.
#[derive(Debug)]
pub struct AqiCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl AqiCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached record for a city while it is still fresh; a stale
    /// or absent entry is a miss, not an error.
    pub async fn get(&self, city_id: &str) -> Option<AirQualityRecord> {
        let entries = self.entries.read().await;
        entries
            .get(city_id)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.record.clone())
    }

    /// Stores a record for a city, unconditionally superseding any previous
    /// entry.
    pub async fn put(&self, city_id: &str, record: AirQualityRecord) {
        let mut entries = self.entries.write().await;
        entries.insert(
            city_id.to_owned(),
            CacheEntry {
                record,
                fetched_at: Instant::now(),
            },
        );
    }
}

impl Default for AqiCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
