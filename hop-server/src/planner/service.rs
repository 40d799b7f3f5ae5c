//! The planner: cached one-way and return searches over a carrier.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{ITINERARY_PREFIX, ItineraryRecord, ReturnsByDate, SearchKey, TtlCache};
use crate::domain::{AirportCode, Itinerary, SearchParams, Via};

use super::availability::AvailabilityClient;
use super::config::SearchConfig;
use super::control::{SearchControl, SearchEvent, SearchSummary};
use super::engine::{HopEngine, HopRequest};
use super::error::SearchError;
use super::provider::{AvailabilitySource, RouteSource};
use super::resolver::RouteResolver;
use super::return_trip::{ReturnPlanner, ReturnRequest};

/// A one-way search as asked for, before clamping.
#[derive(Debug, Clone)]
pub struct OneWayRequest {
    pub origin: AirportCode,
    /// `None` searches every direct destination.
    pub arrival: Option<AirportCode>,
    pub via: Via,
    pub date: NaiveDate,
    pub max_hops: Option<u8>,
    pub min_layover_hours: Option<i64>,
    pub max_layover_hours: Option<i64>,
    /// Later days a layover may spill into; derived from the booking
    /// horizon when absent.
    pub day_budget: Option<u32>,
    /// Ignore a cached record and flight results written before this search.
    pub force_refresh: bool,
}

impl OneWayRequest {
    pub fn new(origin: AirportCode, arrival: Option<AirportCode>, date: NaiveDate) -> Self {
        Self {
            origin,
            arrival,
            via: Via::Unrestricted,
            date,
            max_hops: None,
            min_layover_hours: None,
            max_layover_hours: None,
            day_budget: None,
            force_refresh: false,
        }
    }

    /// Identity of this search in the cache.
    pub fn search_key(&self) -> SearchKey {
        SearchKey {
            origin: self.origin,
            arrival: self.arrival,
            via: self.via.clone(),
            date: self.date,
        }
    }
}

/// Result of a one-way search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub key: SearchKey,
    pub itineraries: Vec<Itinerary>,
    pub summary: SearchSummary,
}

/// Result of a return search.
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub returns: ReturnsByDate,
    /// Whether the returns were attached to a cached outbound record.
    pub merged: bool,
    pub summary: SearchSummary,
}

/// State of a cached search record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedStatus {
    Refresh,
    NoResult,
    Results,
}

/// Listing entry for a cached search.
#[derive(Debug, Clone, Serialize)]
pub struct CachedSearch {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub status: CachedStatus,
    pub itineraries: usize,
    pub message: Option<String>,
}

impl CachedSearch {
    fn new(key: &SearchKey, record: &ItineraryRecord, stored_at: DateTime<Utc>) -> Self {
        let (status, message) = match record {
            ItineraryRecord::Refresh => (CachedStatus::Refresh, None),
            ItineraryRecord::NoResult(message) => (CachedStatus::NoResult, Some(message.clone())),
            ItineraryRecord::Results(_) => (CachedStatus::Results, None),
        };
        Self {
            key: key.to_string(),
            stored_at,
            status,
            itineraries: record.itinerary_count(),
            message,
        }
    }
}

/// Itinerary planner over a carrier.
pub struct Planner<C> {
    resolver: RouteResolver<Arc<C>>,
    availability: AvailabilityClient<Arc<C>>,
    cache: TtlCache,
    config: SearchConfig,
}

impl<C: RouteSource + AvailabilitySource> Planner<C> {
    pub fn new(carrier: C, cache: TtlCache, config: SearchConfig) -> Self {
        let carrier = Arc::new(carrier);
        Self {
            resolver: RouteResolver::new(carrier.clone(), cache.clone()),
            availability: AvailabilityClient::new(carrier, cache.clone(), config.pacing.clone()),
            cache,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn engine(&self) -> HopEngine<'_, Arc<C>, Arc<C>> {
        HopEngine::new(&self.resolver, &self.availability)
    }

    /// Search one way, serving a finished earlier search from the cache.
    ///
    /// A completed search that was neither throttled nor cancelled leaves
    /// its results (or a "no result" note) in the cache. Emits
    /// [`SearchEvent::Finished`] on success.
    pub async fn search_one_way(
        &self,
        request: &OneWayRequest,
        control: &mut SearchControl,
    ) -> Result<SearchOutcome, SearchError> {
        let key = request.search_key();
        let cache_key = key.cache_key();

        match self.cache.get_value::<ItineraryRecord>(&cache_key) {
            Some((ItineraryRecord::Refresh, _)) => {
                debug!(key = %key, "Cached search marked for refresh");
                control.set_force_refresh(true);
            }
            Some((record, _)) if !request.force_refresh => {
                info!(key = %key, "Serving search from cache");
                return Ok(self.serve_cached(key, &record, control));
            }
            _ => {}
        }
        if request.force_refresh {
            control.set_force_refresh(true);
        }

        let itineraries = self.engine().run(&self.hop_request(request), control).await?;

        let mut no_result = None;
        if control.should_stop() {
            info!(key = %key, "Search interrupted, not caching");
        } else {
            let record = if itineraries.is_empty() {
                let message = no_result_message(&key);
                no_result = Some(message.clone());
                ItineraryRecord::NoResult(message)
            } else {
                ItineraryRecord::from_itineraries(itineraries.iter().cloned())
            };
            if let Err(e) = self.cache.set(&cache_key, &record) {
                warn!(key = %key, error = %e, "Failed to cache search");
            }
        }

        let summary = control.summary(itineraries.len(), no_result, false);
        control.emit(SearchEvent::Finished(summary.clone()));
        Ok(SearchOutcome {
            key,
            itineraries,
            summary,
        })
    }

    /// Search the ways back for an outbound itinerary and attach them to
    /// its cached record.
    pub async fn search_return(
        &self,
        request: &ReturnRequest,
        control: &mut SearchControl,
    ) -> Result<ReturnOutcome, SearchError> {
        let mut request = request.clone();
        if request.day_budget.is_none()
            && let Some(date) = request.return_date
            && date >= request.outbound.arrival_date()
        {
            request.day_budget = Some(self.day_budget_from(date));
        }

        let planner = ReturnPlanner::new(self.engine(), self.config.pacing.return_date_delay);
        let returns = planner.run(&request, control).await?;
        let count: usize = returns.values().map(Vec::len).sum();

        let mut merged = false;
        let mut no_result = None;
        if !control.should_stop() {
            merged = self.merge_returns(&request.outbound, &returns);
            if count == 0 {
                no_result = Some(format!(
                    "No {} - {} return flights available",
                    request.outbound.destination(),
                    request.outbound.origin()
                ));
            }
        }

        let summary = control.summary(count, no_result, false);
        control.emit(SearchEvent::Finished(summary.clone()));
        Ok(ReturnOutcome {
            returns,
            merged,
            summary,
        })
    }

    /// Every cached search record, in key order.
    pub fn cached_searches(&self) -> Vec<CachedSearch> {
        self.cache
            .keys_with_prefix(ITINERARY_PREFIX)
            .iter()
            .filter_map(|raw| {
                let search = SearchKey::parse(raw)?;
                let (record, stored_at) = self
                    .cache
                    .get_value::<ItineraryRecord>(&search.cache_key())?;
                Some(CachedSearch::new(&search, &record, stored_at))
            })
            .collect()
    }

    /// Mark a cached search stale so the next identical search runs again.
    ///
    /// Accepts the key with or without its namespace prefix. Returns
    /// `false` when no such search is cached.
    pub fn mark_refresh(&self, key: &str) -> Result<bool, SearchError> {
        let raw = if key.starts_with(ITINERARY_PREFIX) {
            key.to_string()
        } else {
            format!("{ITINERARY_PREFIX}{key}")
        };
        let search = SearchKey::parse(&raw)
            .ok_or_else(|| SearchError::InvalidRequest(format!("not a search key: {key}")))?;
        let cache_key = search.cache_key();

        if self.cache.get_value::<ItineraryRecord>(&cache_key).is_none() {
            return Ok(false);
        }
        self.cache.set(&cache_key, &ItineraryRecord::Refresh)?;
        info!(key = %search, "Search marked for refresh");
        Ok(true)
    }

    /// Drop every cached entry. Returns how many were removed.
    pub fn clear_cache(&self) -> Result<usize, SearchError> {
        let removed = self.cache.clear_prefix("")?;
        info!(removed, "Cache cleared");
        Ok(removed)
    }

    /// Drop the cached route map.
    pub fn refresh_routes(&self) -> Result<(), SearchError> {
        self.resolver.refresh()
    }

    fn hop_request(&self, request: &OneWayRequest) -> HopRequest {
        HopRequest {
            origin: request.origin,
            arrival: request.arrival,
            date: request.date,
            params: SearchParams {
                hop_budget: self.config.hop_budget(request.max_hops),
                min_layover_hours: self.config.min_layover_hours(request.min_layover_hours),
                max_layover_hours: self.config.max_layover_hours(request.max_layover_hours),
                via: request.via.clone(),
            },
            earliest_departure: None,
            day_budget: request
                .day_budget
                .unwrap_or_else(|| self.day_budget_from(request.date)),
        }
    }

    /// Days left in the booking horizon after `date`.
    fn day_budget_from(&self, date: NaiveDate) -> u32 {
        let ahead = date
            .signed_duration_since(Local::now().date_naive())
            .num_days()
            .max(0);
        u32::try_from(ahead).map_or(0, |ahead| self.config.future_days.saturating_sub(ahead))
    }

    fn serve_cached(&self, key: SearchKey, record: &ItineraryRecord, control: &mut SearchControl) -> SearchOutcome {
        let mut itineraries = Vec::new();
        if let ItineraryRecord::Results(by_date) = record {
            for entry in by_date.values().flatten() {
                control.record(entry.outbound.clone());
                itineraries.push(entry.outbound.clone());
                for trip in entry.returns.iter().flat_map(|r| r.values()).flatten() {
                    control.emit(SearchEvent::RoundTrip { trip: trip.clone() });
                }
            }
        }
        let no_result = match record {
            ItineraryRecord::NoResult(message) => Some(message.clone()),
            _ => None,
        };

        let summary = control.summary(itineraries.len(), no_result, true);
        control.emit(SearchEvent::Finished(summary.clone()));
        SearchOutcome {
            key,
            itineraries,
            summary,
        }
    }

    /// Attach `returns` to whichever cached record holds `outbound`.
    fn merge_returns(&self, outbound: &Itinerary, returns: &ReturnsByDate) -> bool {
        for raw in self.cache.keys_with_prefix(ITINERARY_PREFIX) {
            let Some(search) = SearchKey::parse(&raw) else {
                continue;
            };
            let cache_key = search.cache_key();
            let Some((mut record, _)) = self.cache.get_value::<ItineraryRecord>(&cache_key) else {
                continue;
            };
            if record.set_returns(outbound.id(), returns.clone()) {
                return match self.cache.set(&cache_key, &record) {
                    Ok(()) => {
                        debug!(key = %search, outbound = %outbound.id(), "Returns merged");
                        true
                    }
                    Err(e) => {
                        warn!(key = %search, error = %e, "Failed to store returns");
                        false
                    }
                };
            }
        }
        debug!(outbound = %outbound.id(), "Outbound itinerary not cached, returns not merged");
        false
    }
}

fn no_result_message(key: &SearchKey) -> String {
    match &key.arrival {
        Some(arrival) => format!("No {} - {} flights available", key.origin, arrival),
        None => format!("No {} flights available", key.origin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::carrier::{MockCarrier, MockFailure};
    use crate::domain::leg::test_support::{code, date, leg};
    use crate::planner::config::Pacing;
    use crate::planner::control::test_support::recorded_control;

    fn planner() -> (Planner<MockCarrier>, MockCarrier) {
        let mock = MockCarrier::new();
        mock.add_flight(leg("AAA", "BBB", 0, "10:00", "12:00"))
            .add_flight(leg("BBB", "AAA", 0, "18:00", "20:00"))
            .add_route(code("AAA"), code("CCC"))
            .add_airport(code("CCC"));
        let config = SearchConfig::default().with_pacing(Pacing::none());
        let cache = TtlCache::in_memory(CacheConfig::default());
        (Planner::new(mock.clone(), cache, config), mock)
    }

    fn one_way(arrival: &str) -> OneWayRequest {
        OneWayRequest {
            day_budget: Some(0),
            ..OneWayRequest::new(code("AAA"), Some(code(arrival)), date())
        }
    }

    #[tokio::test]
    async fn second_search_is_served_from_cache() {
        let (planner, mock) = planner();

        let mut control = SearchControl::detached();
        let first = planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        assert_eq!(first.itineraries.len(), 1);
        assert!(!first.summary.from_cache);
        let calls = mock.availability_calls();

        let (mut control, sink) = recorded_control();
        let second = planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        assert!(second.summary.from_cache);
        assert_eq!(second.itineraries[0].id(), first.itineraries[0].id());
        assert_eq!(sink.itineraries().len(), 1);
        assert!(matches!(sink.events().last(), Some(SearchEvent::Finished(_))));
        assert_eq!(mock.availability_calls(), calls);
    }

    #[tokio::test]
    async fn empty_search_records_no_result() {
        let (planner, _) = planner();

        let mut control = SearchControl::detached();
        let outcome = planner.search_one_way(&one_way("CCC"), &mut control).await.unwrap();
        assert_eq!(
            outcome.summary.no_result.as_deref(),
            Some("No AAA - CCC flights available")
        );

        let cached = planner.cached_searches();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].key, "AAA-CCC-_-2025-03-01");
        assert_eq!(cached[0].status, CachedStatus::NoResult);

        let mut control = SearchControl::detached();
        let again = planner.search_one_way(&one_way("CCC"), &mut control).await.unwrap();
        assert!(again.summary.from_cache);
        assert_eq!(again.summary.no_result, outcome.summary.no_result);
    }

    #[tokio::test]
    async fn refresh_marker_forces_new_queries() {
        let (planner, mock) = planner();

        let mut control = SearchControl::detached();
        planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        let calls = mock.availability_calls();

        assert!(planner.mark_refresh("AAA-BBB-_-2025-03-01").unwrap());
        assert_eq!(planner.cached_searches()[0].status, CachedStatus::Refresh);

        let mut control = SearchControl::detached();
        let outcome = planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        assert!(!outcome.summary.from_cache);
        assert!(control.force_refresh());
        assert!(mock.availability_calls() > calls);
        assert_eq!(planner.cached_searches()[0].status, CachedStatus::Results);
    }

    #[tokio::test]
    async fn force_refresh_skips_cached_record() {
        let (planner, mock) = planner();

        let mut control = SearchControl::detached();
        planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        let calls = mock.availability_calls();

        let request = OneWayRequest {
            force_refresh: true,
            ..one_way("BBB")
        };
        let mut control = SearchControl::detached();
        let outcome = planner.search_one_way(&request, &mut control).await.unwrap();
        assert!(!outcome.summary.from_cache);
        assert!(mock.availability_calls() > calls);
    }

    #[tokio::test]
    async fn rate_limited_search_is_not_cached() {
        let (planner, mock) = planner();
        mock.fail(code("AAA"), code("BBB"), date(), MockFailure::RateLimited);

        let mut control = SearchControl::detached();
        let outcome = planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        assert!(outcome.summary.rate_limited);
        assert!(outcome.summary.no_result.is_none());
        assert!(planner.cached_searches().is_empty());
    }

    #[tokio::test]
    async fn mark_refresh_unknown_and_invalid_keys() {
        let (planner, _) = planner();
        assert!(!planner.mark_refresh("AAA-BBB-_-2025-03-01").unwrap());
        assert!(matches!(
            planner.mark_refresh("nonsense"),
            Err(SearchError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn return_search_merges_into_outbound_record() {
        let (planner, _) = planner();

        let mut control = SearchControl::detached();
        let outbound = planner
            .search_one_way(&one_way("BBB"), &mut control)
            .await
            .unwrap()
            .itineraries
            .remove(0);

        let request = ReturnRequest {
            outbound: outbound.clone(),
            return_date: Some(date()),
            day_budget: Some(0),
        };
        let mut control = SearchControl::detached();
        let outcome = planner.search_return(&request, &mut control).await.unwrap();
        assert!(outcome.merged);
        assert_eq!(outcome.summary.itineraries, 1);

        // The cached record now carries the returns and replays them
        let (mut control, sink) = recorded_control();
        planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        let trips: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SearchEvent::RoundTrip { trip } => Some(trip),
                _ => None,
            })
            .collect();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].outbound_id, outbound.id());
    }

    #[tokio::test]
    async fn clear_cache_and_refresh_routes() {
        let (planner, mock) = planner();

        let mut control = SearchControl::detached();
        planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        assert!(planner.clear_cache().unwrap() >= 3);
        assert!(planner.cached_searches().is_empty());

        planner.refresh_routes().unwrap();
        let mut control = SearchControl::detached();
        planner.search_one_way(&one_way("BBB"), &mut control).await.unwrap();
        assert_eq!(mock.route_map_calls(), 2);
    }

    #[test]
    fn day_budget_follows_booking_horizon() {
        let (planner, _) = planner();
        let today = Local::now().date_naive();
        assert_eq!(planner.day_budget_from(today), 3);
        assert_eq!(planner.day_budget_from(today + chrono::Duration::days(2)), 1);
        assert_eq!(planner.day_budget_from(today + chrono::Duration::days(10)), 0);
    }

    #[test]
    fn request_parameters_are_clamped() {
        let (planner, _) = planner();
        let request = OneWayRequest {
            max_hops: Some(9),
            min_layover_hours: Some(0),
            max_layover_hours: Some(6),
            ..OneWayRequest::new(code("AAA"), None, date())
        };
        let hop = planner.hop_request(&request);
        assert_eq!(hop.params.hop_budget, 4);
        assert_eq!(hop.params.min_layover_hours, 1);
        assert_eq!(hop.params.max_layover_hours, Some(6));
    }
}
