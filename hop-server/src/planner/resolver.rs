//! Route resolution: which airports can be reached directly from an airport.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::cache::{CacheKey, TtlCache};
use crate::domain::{AirportCode, RouteMap};

use super::error::SearchError;
use super::provider::RouteSource;

/// Answers "where can I fly from here" from the cached route map.
///
/// The route map is fetched as a whole on the first miss and cached in the
/// page namespace.
pub struct RouteResolver<R> {
    source: R,
    cache: TtlCache,
}

impl<R: RouteSource> RouteResolver<R> {
    pub fn new(source: R, cache: TtlCache) -> Self {
        Self { source, cache }
    }

    /// The whole route map, from cache or freshly fetched.
    pub async fn route_map(&self) -> Result<RouteMap, SearchError> {
        if let Some((map, _)) = self.cache.get_value::<RouteMap>(&CacheKey::RouteMap) {
            return Ok(map);
        }

        info!("Route map not cached, fetching");
        let map = self
            .source
            .fetch_route_map()
            .await
            .map_err(SearchError::from_route_fetch)?;

        if let Err(e) = self.cache.set(&CacheKey::RouteMap, &map) {
            warn!(error = %e, "Failed to cache route map");
        }
        Ok(map)
    }

    /// Destinations directly reachable from `origin`.
    ///
    /// Fails with [`SearchError::NoRouteData`] when the map has no row for
    /// `origin`.
    pub async fn resolve(&self, origin: &AirportCode) -> Result<BTreeSet<AirportCode>, SearchError> {
        let map = self.route_map().await?;
        let destinations = map
            .destinations(origin)
            .cloned()
            .ok_or(SearchError::NoRouteData(*origin))?;
        debug!(%origin, count = destinations.len(), "Resolved destinations");
        Ok(destinations)
    }

    /// Check that `airport` has a row in the route map.
    pub async fn verify(&self, airport: &AirportCode) -> Result<(), SearchError> {
        self.resolve(airport).await.map(|_| ())
    }

    /// Drop the cached route map so the next lookup refetches it.
    pub fn refresh(&self) -> Result<(), SearchError> {
        self.cache.invalidate(&CacheKey::RouteMap)?;
        info!("Route map cache dropped");
        Ok(())
    }
}
