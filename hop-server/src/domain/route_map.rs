//! The carrier's route graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::AirportCode;

/// Directed route graph: for each airport, the airports it has flights to.
///
/// The carrier publishes the whole graph in one document, so the map is
/// always fetched and cached as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMap {
    routes: BTreeMap<AirportCode, BTreeSet<AirportCode>>,
}

impl RouteMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directed route. Self-loops are ignored.
    pub fn add(&mut self, from: AirportCode, to: AirportCode) {
        if from == to {
            return;
        }
        self.routes.entry(from).or_default().insert(to);
    }

    /// Register an airport with no outgoing routes yet.
    ///
    /// The feed lists departure stations even when their destination list
    /// is empty; such airports have route data, just no flights.
    pub fn add_airport(&mut self, airport: AirportCode) {
        self.routes.entry(airport).or_default();
    }

    /// Destinations from `origin`, or `None` when the feed has no row for it.
    pub fn destinations(&self, origin: &AirportCode) -> Option<&BTreeSet<AirportCode>> {
        self.routes.get(origin)
    }

    /// Whether there is a direct route `from → to`.
    pub fn has_route(&self, from: &AirportCode, to: &AirportCode) -> bool {
        self.routes.get(from).is_some_and(|d| d.contains(to))
    }

    /// Number of airports with a row in the feed.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate over all airports with a row.
    pub fn airports(&self) -> impl Iterator<Item = &AirportCode> {
        self.routes.keys()
    }
}

impl FromIterator<(AirportCode, AirportCode)> for RouteMap {
    fn from_iter<I: IntoIterator<Item = (AirportCode, AirportCode)>>(iter: I) -> Self {
        let mut map = RouteMap::new();
        for (from, to) in iter {
            map.add(from, to);
        }
        map
    }
}
