//! Data transfer objects for web requests and responses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{AirportCode, Itinerary, Via};
use crate::planner::{CachedSearch, OneWayRequest, ReturnRequest};

/// Request to search one way.
#[derive(Debug, Deserialize)]
pub struct OneWaySearchRequest {
    /// Origin airport code
    pub origin: String,

    /// Arrival airport code; empty or absent searches every direct
    /// destination
    #[serde(default)]
    pub arrival: Option<String>,

    /// Comma separated connection airports, or `ANY`
    #[serde(default)]
    pub via: Option<String>,

    /// Departure date
    pub date: NaiveDate,

    /// Maximum number of legs
    pub max_hops: Option<u8>,

    /// Minimum layover in hours
    pub min_layover_hours: Option<i64>,

    /// Maximum layover in hours
    pub max_layover_hours: Option<i64>,

    /// Later days a connection may spill into
    pub day_budget: Option<u32>,

    /// Ignore cached results
    #[serde(default)]
    pub force_refresh: bool,
}

impl OneWaySearchRequest {
    /// Parse airport codes and the via list into a planner request.
    pub fn to_request(&self) -> Result<OneWayRequest, String> {
        let origin = AirportCode::parse_normalized(&self.origin)
            .map_err(|_| format!("Invalid origin airport: {}", self.origin))?;

        let arrival = self
            .arrival
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .map(|a| {
                AirportCode::parse_normalized(a).map_err(|_| format!("Invalid arrival airport: {a}"))
            })
            .transpose()?;

        let via = match self.via.as_deref() {
            Some(list) => {
                Via::parse_list(list).map_err(|e| format!("Invalid via list: {e}"))?
            }
            None => Via::Unrestricted,
        };

        Ok(OneWayRequest {
            via,
            max_hops: self.max_hops,
            min_layover_hours: self.min_layover_hours,
            max_layover_hours: self.max_layover_hours,
            day_budget: self.day_budget,
            force_refresh: self.force_refresh,
            ..OneWayRequest::new(origin, arrival, self.date)
        })
    }
}

/// Request to search the way back for an outbound itinerary.
#[derive(Debug, Deserialize)]
pub struct ReturnSearchRequest {
    /// The outbound itinerary, as streamed by a one-way search
    pub outbound: Itinerary,

    /// First return date (defaults to the outbound arrival date)
    pub return_date: Option<NaiveDate>,

    /// Later dates to search
    pub day_budget: Option<u32>,

    /// Ignore cached flight results
    #[serde(default)]
    pub force_refresh: bool,
}

impl ReturnSearchRequest {
    pub fn to_request(&self) -> Result<ReturnRequest, String> {
        self.outbound
            .revalidate()
            .map_err(|e| format!("Invalid outbound itinerary: {e}"))?;
        Ok(ReturnRequest {
            outbound: self.outbound.clone(),
            return_date: self.return_date,
            day_budget: self.day_budget,
        })
    }
}

/// Response listing cached searches.
#[derive(Debug, Serialize)]
pub struct CachedSearchesResponse {
    pub searches: Vec<CachedSearch>,
}

/// Response to clearing the cache.
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    /// Number of entries removed
    pub removed: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
