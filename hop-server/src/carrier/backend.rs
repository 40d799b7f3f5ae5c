//! Runtime choice between the live carrier and the mock.

use chrono::NaiveDate;

use crate::domain::{AirportCode, FlightLeg, RouteMap};
use crate::planner::{AvailabilitySource, RouteSource};

use super::client::CarrierClient;
use super::error::CarrierError;
use super::mock::MockCarrier;
use super::session::FileSession;

/// The carrier a server instance talks to.
pub enum CarrierBackend {
    Live(CarrierClient<FileSession>),
    Mock(MockCarrier),
}

impl CarrierBackend {
    pub fn name(&self) -> &'static str {
        match self {
            CarrierBackend::Live(_) => "live",
            CarrierBackend::Mock(_) => "mock",
        }
    }
}

impl RouteSource for CarrierBackend {
    async fn fetch_route_map(&self) -> Result<RouteMap, CarrierError> {
        match self {
            CarrierBackend::Live(client) => client.fetch_route_map().await,
            CarrierBackend::Mock(mock) => mock.fetch_route_map().await,
        }
    }
}

impl AvailabilitySource for CarrierBackend {
    async fn fetch_availability(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> Result<Vec<FlightLeg>, CarrierError> {
        match self {
            CarrierBackend::Live(client) => client.fetch_availability(origin, destination, date).await,
            CarrierBackend::Mock(mock) => mock.fetch_availability(origin, destination, date).await,
        }
    }
}
