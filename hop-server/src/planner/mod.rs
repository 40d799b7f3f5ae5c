//! Itinerary planner using breadth-first hop search.
//!
//! This module answers: "how can I get from this airport to that one on a
//! given date, changing planes at most N times?" Route data narrows where
//! each hop may go; availability queries, paced to stay under the carrier's
//! rate limit, confirm which flights actually connect.

mod availability;
mod config;
mod control;
mod engine;
mod error;
mod provider;
mod resolver;
mod return_trip;
mod service;

pub use availability::AvailabilityClient;
pub use config::{Pacing, SearchConfig};
pub use control::{CancelHandle, SearchControl, SearchEvent, SearchSummary};
pub use engine::{HopEngine, HopRequest, HopState, discover_paths};
pub use error::SearchError;
pub use provider::{AvailabilitySource, EventSink, NoopSink, RouteSource};
pub use resolver::RouteResolver;
pub use return_trip::{ReturnPlanner, ReturnRequest};
pub use service::{CachedSearch, CachedStatus, OneWayRequest, Planner, ReturnOutcome, SearchOutcome};
