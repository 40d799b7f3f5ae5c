//! Domain types for the itinerary search engine.
//!
//! This module contains the core domain model types: validated airport
//! codes, corrected flight legs, the route graph, and assembled
//! itineraries. Types enforce their invariants at construction time, so
//! code that receives them can trust their validity.

mod airport;
mod error;
mod itinerary;
pub(crate) mod leg;
mod route_map;
mod time;
mod via;

pub use airport::{AirportCode, InvalidAirportCode};
pub use error::DomainError;
pub use itinerary::{AssemblyContext, Itinerary, NextWindow, RoundTrip, SearchParams};
pub use leg::FlightLeg;
pub use route_map::RouteMap;
pub use time::{FeedOffset, TimeError, correct_feed_instant, format_duration, parse_feed_datetime};
pub use via::{ANY_KEYWORD, Via};

#[cfg(test)]
pub(crate) use itinerary::test_support as itinerary_support;
