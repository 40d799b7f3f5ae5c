//! Application state for the web layer.

use std::sync::Arc;

use crate::carrier::CarrierBackend;
use crate::planner::Planner;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Itinerary planner over the configured carrier
    pub planner: Arc<Planner<CarrierBackend>>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(planner: Planner<CarrierBackend>) -> Self {
        Self {
            planner: Arc::new(planner),
        }
    }
}
