//! Mock carrier for development and testing without a carrier session.
//!
//! Serves a fixed route map and flight list from memory, optionally loaded
//! from JSON fixture files, as if they were live API responses.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::domain::{AirportCode, FlightLeg, RouteMap};
use crate::planner::{AvailabilitySource, RouteSource};

use super::convert::{convert_flight, convert_route_map};
use super::error::CarrierError;
use super::types::{FlightDto, RouteMapResponse};

type QueryKey = (AirportCode, AirportCode, NaiveDate);

/// A failure the mock should produce for a given query.
#[derive(Debug, Clone)]
pub enum MockFailure {
    RateLimited,
    Api(String),
    Session(String),
}

impl MockFailure {
    fn to_error(&self) -> CarrierError {
        match self {
            MockFailure::RateLimited => CarrierError::RateLimited,
            MockFailure::Api(message) => CarrierError::Api {
                status: 500,
                message: message.clone(),
            },
            MockFailure::Session(message) => CarrierError::SessionUnavailable(message.clone()),
        }
    }
}

#[derive(Default)]
struct MockState {
    routes: RouteMap,
    flights: HashMap<QueryKey, Vec<FlightLeg>>,
    failures: HashMap<QueryKey, MockFailure>,
    /// Queries answered with HTTP 400.
    unavailable: HashSet<QueryKey>,
    session_error: Option<String>,
    queries: Vec<QueryKey>,
    route_map_calls: usize,
}

/// Mock carrier that serves data from memory.
#[derive(Clone, Default)]
pub struct MockCarrier {
    state: Arc<Mutex<MockState>>,
}

impl MockCarrier {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fixtures from a directory.
    ///
    /// Expects `routes.json` (the route map document) and `flights.json`
    /// (a list of flights in the carrier's format). Each flight is served
    /// for the local calendar date it departs on.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CarrierError> {
        let dir = dir.as_ref();

        let routes: RouteMapResponse = read_fixture(&dir.join("routes.json"))?;
        let flights: Vec<FlightDto> = read_fixture(&dir.join("flights.json"))?;

        let mock = Self::new();
        {
            let mut state = mock.lock();
            state.routes = convert_route_map(&routes);
        }

        for dto in &flights {
            let placeholder = NaiveDate::MIN;
            let mut leg = convert_flight(dto, placeholder).map_err(|e| CarrierError::Api {
                status: 0,
                message: format!("Invalid mock flight {}: {e}", dto.departure_station),
            })?;
            leg.search_date = leg.local_departure().date();
            mock.add_flight(leg);
        }

        Ok(mock)
    }

    /// Add a route to the map.
    pub fn add_route(&self, from: AirportCode, to: AirportCode) -> &Self {
        self.lock().routes.add(from, to);
        self
    }

    /// Register an airport with no routes of its own.
    pub fn add_airport(&self, airport: AirportCode) -> &Self {
        self.lock().routes.add_airport(airport);
        self
    }

    /// Add a flight, served for its search date. Its route is added too.
    pub fn add_flight(&self, leg: FlightLeg) -> &Self {
        let mut state = self.lock();
        state.routes.add(leg.origin, leg.destination);
        state
            .flights
            .entry((leg.origin, leg.destination, leg.search_date))
            .or_default()
            .push(leg);
        self
    }

    /// Make a query fail.
    pub fn fail(
        &self,
        origin: AirportCode,
        destination: AirportCode,
        date: NaiveDate,
        failure: MockFailure,
    ) -> &Self {
        self.lock()
            .failures
            .insert((origin, destination, date), failure);
        self
    }

    /// Make a query answer HTTP 400 ("not available").
    pub fn unavailable(&self, origin: AirportCode, destination: AirportCode, date: NaiveDate) -> &Self {
        self.lock().unavailable.insert((origin, destination, date));
        self
    }

    /// Make every call fail as if no session existed.
    pub fn without_session(&self, message: impl Into<String>) -> &Self {
        self.lock().session_error = Some(message.into());
        self
    }

    /// Number of availability queries answered.
    pub fn availability_calls(&self) -> usize {
        self.lock().queries.len()
    }

    /// Every availability query in order.
    pub fn queries(&self) -> Vec<(AirportCode, AirportCode, NaiveDate)> {
        self.lock().queries.clone()
    }

    /// Number of route map fetches.
    pub fn route_map_calls(&self) -> usize {
        self.lock().route_map_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RouteSource for MockCarrier {
    async fn fetch_route_map(&self) -> Result<RouteMap, CarrierError> {
        let mut state = self.lock();
        state.route_map_calls += 1;
        if let Some(message) = &state.session_error {
            return Err(CarrierError::SessionUnavailable(message.clone()));
        }
        Ok(state.routes.clone())
    }
}

impl AvailabilitySource for MockCarrier {
    async fn fetch_availability(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> Result<Vec<FlightLeg>, CarrierError> {
        let mut state = self.lock();
        let key = (*origin, *destination, date);
        state.queries.push(key);

        if let Some(message) = &state.session_error {
            return Err(CarrierError::SessionUnavailable(message.clone()));
        }
        if let Some(failure) = state.failures.get(&key) {
            return Err(failure.to_error());
        }
        if state.unavailable.contains(&key) {
            return Err(CarrierError::NotAvailable {
                code: Some(super::types::CODE_NOT_AVAILABLE.to_string()),
            });
        }

        Ok(state.flights.get(&key).cloned().unwrap_or_default())
    }
}

fn read_fixture<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CarrierError> {
    let json = std::fs::read_to_string(path).map_err(|e| CarrierError::Api {
        status: 0,
        message: format!("Failed to read {}: {e}", path.display()),
    })?;
    serde_json::from_str(&json).map_err(|e| CarrierError::Api {
        status: 0,
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}
