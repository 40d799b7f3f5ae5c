//! Search error types.

use chrono::NaiveDate;

use crate::cache::CacheError;
use crate::carrier::CarrierError;
use crate::domain::AirportCode;

/// Error from itinerary search.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// The route map has no row for this airport
    #[error("no route data for {0}")]
    NoRouteData(AirportCode),

    /// No usable carrier session
    #[error("session unavailable: {0}")]
    SessionUnavailable(String),

    /// An availability query failed for a reason other than throttling
    #[error("availability query {origin}-{destination} on {date} failed: {message}")]
    Availability {
        origin: AirportCode,
        destination: AirportCode,
        date: NaiveDate,
        message: String,
    },

    /// The carrier is throttling this session
    #[error("rate limited by the carrier; try again later")]
    RateLimited,

    /// A hop budget of one can't reach the arrival
    #[error(
        "no direct flights from {origin} to {arrival}; specify a list of via airports or set it to ANY"
    )]
    NoDirectRoute {
        origin: AirportCode,
        arrival: AirportCode,
    },

    /// Invalid search request
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    /// The route map could not be fetched
    #[error("failed to fetch route map: {0}")]
    RouteFetch(String),

    /// The cache backend failed
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl SearchError {
    /// Map a carrier error from a route map fetch.
    pub(crate) fn from_route_fetch(err: CarrierError) -> Self {
        match err {
            CarrierError::SessionUnavailable(message) => SearchError::SessionUnavailable(message),
            e if e.is_rate_limit() => SearchError::RateLimited,
            e => SearchError::RouteFetch(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let bud = AirportCode::parse("BUD").unwrap();
        let ltn = AirportCode::parse("LTN").unwrap();

        assert_eq!(
            SearchError::NoRouteData(bud).to_string(),
            "no route data for BUD"
        );
        assert_eq!(
            SearchError::NoDirectRoute {
                origin: bud,
                arrival: ltn
            }
            .to_string(),
            "no direct flights from BUD to LTN; specify a list of via airports or set it to ANY"
        );
        assert_eq!(
            SearchError::Availability {
                origin: bud,
                destination: ltn,
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                message: "API error 500: boom".into(),
            }
            .to_string(),
            "availability query BUD-LTN on 2025-03-01 failed: API error 500: boom"
        );
    }

    #[test]
    fn route_fetch_mapping() {
        assert!(matches!(
            SearchError::from_route_fetch(CarrierError::SessionUnavailable("x".into())),
            SearchError::SessionUnavailable(m) if m == "x"
        ));
        assert!(matches!(
            SearchError::from_route_fetch(CarrierError::RateLimited),
            SearchError::RateLimited
        ));
        assert!(matches!(
            SearchError::from_route_fetch(CarrierError::Api {
                status: 500,
                message: "boom".into()
            }),
            SearchError::RouteFetch(_)
        ));
    }
}
