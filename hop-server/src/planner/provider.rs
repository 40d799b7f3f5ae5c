//! Capabilities the planner consumes.
//!
//! These abstractions let the planner run against the live carrier, the
//! mock carrier or hand-written test doubles.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::channel::mpsc::UnboundedSender;

use crate::carrier::CarrierError;
use crate::domain::{AirportCode, FlightLeg, RouteMap};

use super::control::SearchEvent;

/// Source of the carrier's route map.
pub trait RouteSource: Send + Sync {
    /// Fetch the whole route map.
    fn fetch_route_map(&self) -> impl Future<Output = Result<RouteMap, CarrierError>> + Send;
}

/// Source of flight availability.
pub trait AvailabilitySource: Send + Sync {
    /// Flights from `origin` to `destination` on `date`.
    ///
    /// "No flights" may come back either as an empty list or as
    /// [`CarrierError::NotAvailable`].
    fn fetch_availability(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<FlightLeg>, CarrierError>> + Send;
}

impl<T: RouteSource> RouteSource for Arc<T> {
    fn fetch_route_map(&self) -> impl Future<Output = Result<RouteMap, CarrierError>> + Send {
        (**self).fetch_route_map()
    }
}

impl<T: AvailabilitySource> AvailabilitySource for Arc<T> {
    fn fetch_availability(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<FlightLeg>, CarrierError>> + Send {
        (**self).fetch_availability(origin, destination, date)
    }
}

/// Receiver of progressive search events.
///
/// Emission must not block; a slow or gone consumer never stalls the search.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SearchEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: SearchEvent) {}
}

impl EventSink for UnboundedSender<SearchEvent> {
    fn emit(&self, event: SearchEvent) {
        // The receiver is gone when the client disconnected; cancellation
        // is handled separately.
        let _ = self.unbounded_send(event);
    }
}
