//! Web layer for the itinerary planner.
//!
//! Searches stream their progress as newline-delimited JSON events; the
//! remaining endpoints manage the result cache.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
