//! Carrier pass API client.
//!
//! Key characteristics of the carrier's private API:
//! - Every request needs the headers of a logged in browser session
//! - The route map is one document covering every airport
//! - Availability is one POST per (origin, destination, date)
//! - HTTP 400 means "no flights", not a malformed request
//! - Reported date-times carry the timezone offset with the wrong sign

mod backend;
mod client;
mod convert;
mod error;
mod mock;
mod session;
mod types;

pub use backend::CarrierBackend;
pub use client::{CarrierClient, CarrierConfig};
pub use convert::{ConversionError, convert_flight, convert_flights, convert_route_map};
pub use error::CarrierError;
pub use mock::{MockCarrier, MockFailure};
pub use session::{CarrierSession, FileSession, SessionSource, StaticSession};
pub use types::{
    ApiErrorBody, AvailabilityRequest, AvailabilityResponse, FlightDto, RouteDto,
    RouteMapResponse, StationRef,
};
