//! Expiring cache on top of a [`KeyValueStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::key::{CacheKey, Namespace};
use super::record::ItineraryRecord;
use super::store::{CacheEntry, KeyValueStore, MemoryStore};
use super::CacheError;

/// Expiry settings for the cache namespaces.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for the route map and session.
    pub page_ttl: Duration,

    /// TTL for flight results and itinerary records.
    pub results_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_ttl: Duration::from_secs(60 * 60),
            results_ttl: Duration::from_secs(8 * 60 * 60),
        }
    }
}

impl CacheConfig {
    /// Set the page TTL.
    pub fn with_page_ttl(mut self, ttl: Duration) -> Self {
        self.page_ttl = ttl;
        self
    }

    /// Set the results TTL.
    pub fn with_results_ttl(mut self, ttl: Duration) -> Self {
        self.results_ttl = ttl;
        self
    }
}

/// Key/value cache with per-namespace expiry.
///
/// Reads evict expired entries. An expired itinerary record is replaced by
/// [`ItineraryRecord::Refresh`] instead of being deleted.
#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl TtlCache {
    /// Create a cache over the given backend.
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Create a cache backed by memory only.
    pub fn in_memory(config: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store, config)
    }

    /// Get the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// TTL that applies to a namespace.
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Page => self.config.page_ttl,
            Namespace::Flights | Namespace::Itinerary => self.config.results_ttl,
        }
    }

    /// Read a raw entry, treating anything at least `ttl` old as absent.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<CacheEntry> {
        let entry = self.store.load(key)?;

        if !is_expired(entry.stored_at, ttl, Utc::now()) {
            return Some(entry);
        }

        debug!(key, "Cache entry expired");
        let evicted = if Namespace::of(key) == Some(Namespace::Itinerary) {
            self.write(key, &ItineraryRecord::Refresh)
        } else {
            self.store.remove(key)
        };
        if let Err(e) = evicted {
            warn!(key, error = %e, "Failed to evict expired entry");
        }
        None
    }

    /// Read and decode a typed entry under its namespace TTL.
    ///
    /// An entry that no longer decodes is treated as absent.
    pub fn get_value<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<(T, DateTime<Utc>)> {
        let raw = key.to_string();
        let entry = self.get(&raw, self.ttl_for(key.namespace()))?;
        match serde_json::from_value(entry.payload) {
            Ok(value) => Some((value, entry.stored_at)),
            Err(e) => {
                warn!(key = %raw, error = %e, "Ignoring undecodable cache entry");
                None
            }
        }
    }

    /// Store a value, replacing anything under the key.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<(), CacheError> {
        self.write(&key.to_string(), value)
    }

    /// Store a raw entry as-is (including its timestamp).
    pub fn set_entry(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.store.store(key, entry)
    }

    /// Delete a key.
    pub fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.store.remove(&key.to_string())
    }

    /// Raw keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        keys
    }

    /// Delete every key starting with `prefix`. Returns how many were removed.
    pub fn clear_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let keys = self.keys_with_prefix(prefix);
        self.store.remove_many(&keys)?;
        Ok(keys.len())
    }

    /// Sweep the whole store for expired entries.
    ///
    /// Expired page and flight entries are deleted; expired itinerary
    /// records become [`ItineraryRecord::Refresh`] markers, and markers
    /// themselves are left alone. Keys outside the known namespaces are
    /// untouched. Returns how many entries were deleted or marked.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Utc::now();
        let mut expired = Vec::new();
        let mut stale_searches = Vec::new();

        for key in self.store.keys() {
            let Some(namespace) = Namespace::of(&key) else {
                continue;
            };
            let Some(entry) = self.store.load(&key) else {
                continue;
            };
            if !is_expired(entry.stored_at, self.ttl_for(namespace), now) {
                continue;
            }
            if namespace != Namespace::Itinerary {
                expired.push(key);
            } else if !is_refresh_marker(&entry) {
                stale_searches.push(key);
            }
        }

        self.store.remove_many(&expired)?;
        for key in &stale_searches {
            self.write(key, &ItineraryRecord::Refresh)?;
        }

        let purged = expired.len() + stale_searches.len();
        if purged > 0 {
            info!(
                removed = expired.len(),
                marked = stale_searches.len(),
                "Purged expired cache entries"
            );
        }
        Ok(purged)
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let payload = serde_json::to_value(value).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })?;
        self.store.store(key, CacheEntry::now(payload))
    }
}

fn is_refresh_marker(entry: &CacheEntry) -> bool {
    serde_json::from_value::<ItineraryRecord>(entry.payload.clone())
        .is_ok_and(|record| record == ItineraryRecord::Refresh)
}

fn is_expired(stored_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(stored_at);
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => age >= ttl,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::{ITINERARY_PREFIX, SearchKey};
    use crate::cache::store::FileStore;
    use crate::domain::{AirportCode, Via};
    use chrono::NaiveDate;
    use serde_json::json;

    fn cache() -> TtlCache {
        TtlCache::in_memory(CacheConfig::default())
    }

    fn aged(payload: serde_json::Value, age: chrono::Duration) -> CacheEntry {
        CacheEntry {
            payload,
            stored_at: Utc::now() - age,
        }
    }

    fn flights_key() -> CacheKey {
        CacheKey::Flights {
            origin: AirportCode::parse("BUD").unwrap(),
            destination: AirportCode::parse("LTN").unwrap(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        }
    }

    fn search_key() -> SearchKey {
        SearchKey {
            origin: AirportCode::parse("BUD").unwrap(),
            arrival: Some(AirportCode::parse("LTN").unwrap()),
            via: Via::Unrestricted,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        }
    }

    #[test]
    fn set_then_get() {
        let cache = cache();
        cache.set(&flights_key(), &vec![1, 2, 3]).unwrap();
        let (value, _) = cache.get_value::<Vec<i32>>(&flights_key()).unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[test]
    fn expired_entry_is_evicted() {
        let cache = cache();
        let key = flights_key().to_string();
        cache
            .set_entry(&key, aged(json!([]), chrono::Duration::hours(8)))
            .unwrap();

        assert!(cache.get(&key, Duration::from_secs(8 * 3600)).is_none());
        assert!(cache.keys_with_prefix("flights:").is_empty());
    }

    #[test]
    fn entry_just_inside_ttl_is_kept() {
        let cache = cache();
        let key = flights_key().to_string();
        cache
            .set_entry(&key, aged(json!([]), chrono::Duration::minutes(479)))
            .unwrap();
        assert!(cache.get(&key, Duration::from_secs(8 * 3600)).is_some());
    }

    #[test]
    fn expired_itinerary_becomes_refresh_marker() {
        let cache = cache();
        let key = search_key().cache_key();
        cache
            .set_entry(
                &key.to_string(),
                aged(json!({"NoResult": "nothing"}), chrono::Duration::hours(9)),
            )
            .unwrap();

        assert!(cache.get_value::<ItineraryRecord>(&key).is_none());

        let (record, _) = cache.get_value::<ItineraryRecord>(&key).unwrap();
        assert_eq!(record, ItineraryRecord::Refresh);
    }

    #[test]
    fn page_namespace_uses_page_ttl() {
        let cache = cache();
        cache
            .set_entry("page:routes", aged(json!({}), chrono::Duration::minutes(61)))
            .unwrap();
        assert!(cache.get_value::<serde_json::Value>(&CacheKey::RouteMap).is_none());
    }

    #[test]
    fn prefix_listing_and_clearing() {
        let cache = cache();
        cache.set(&flights_key(), &json!([])).unwrap();
        cache.set(&search_key().cache_key(), &ItineraryRecord::Refresh).unwrap();
        cache.set(&CacheKey::RouteMap, &json!({})).unwrap();

        assert_eq!(
            cache.keys_with_prefix(ITINERARY_PREFIX),
            ["itinerary:BUD-LTN-_-2025-03-01"]
        );
        assert_eq!(cache.clear_prefix("flights:").unwrap(), 1);
        assert!(cache.keys_with_prefix("flights:").is_empty());
        assert_eq!(cache.keys_with_prefix("").len(), 2);
    }

    #[test]
    fn invalidate_removes() {
        let cache = cache();
        cache.set(&CacheKey::Session, &json!({"a": 1})).unwrap();
        cache.invalidate(&CacheKey::Session).unwrap();
        assert!(cache.get_value::<serde_json::Value>(&CacheKey::Session).is_none());
    }

    #[test]
    fn purge_sweeps_expired_entries_from_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = TtlCache::new(Arc::new(FileStore::open(&path)), CacheConfig::default());

        let old_flights = flights_key().to_string();
        let old_search = search_key().cache_key().to_string();
        cache
            .set_entry(&old_flights, aged(json!([]), chrono::Duration::hours(9)))
            .unwrap();
        cache
            .set_entry(&old_search, aged(json!({"NoResult": "nothing"}), chrono::Duration::hours(9)))
            .unwrap();
        cache
            .set_entry("page:routes", aged(json!({}), chrono::Duration::minutes(90)))
            .unwrap();
        cache.set(&CacheKey::Session, &json!({"a": 1})).unwrap();
        cache
            .set_entry("unrelated", aged(json!(1), chrono::Duration::days(30)))
            .unwrap();

        assert_eq!(cache.purge_expired().unwrap(), 3);

        let reopened = FileStore::open(&path);
        let mut keys = reopened.keys();
        keys.sort();
        assert_eq!(keys, [old_search.as_str(), "page:session", "unrelated"]);
        assert_eq!(
            serde_json::from_value::<ItineraryRecord>(reopened.load(&old_search).unwrap().payload)
                .unwrap(),
            ItineraryRecord::Refresh
        );

        // A fresh refresh marker is not rewritten by a second sweep
        assert_eq!(cache.purge_expired().unwrap(), 0);
    }

    #[test]
    fn purge_leaves_expired_refresh_markers() {
        let cache = cache();
        let key = search_key().cache_key().to_string();
        let marker = serde_json::to_value(ItineraryRecord::Refresh).unwrap();
        cache
            .set_entry(&key, aged(marker, chrono::Duration::hours(9)))
            .unwrap();

        assert_eq!(cache.purge_expired().unwrap(), 0);
        assert_eq!(cache.keys_with_prefix(ITINERARY_PREFIX), [key]);
    }

    #[test]
    fn undecodable_entry_is_absent() {
        let cache = cache();
        cache.set(&flights_key(), &json!("not a list")).unwrap();
        assert!(cache.get_value::<Vec<i32>>(&flights_key()).is_none());
    }
}
