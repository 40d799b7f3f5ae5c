//! Carrier API request and response DTOs.
//!
//! These map directly to the JSON the carrier's pass pages exchange. Fields
//! the engine does not depend on are optional because the carrier omits
//! them freely.

use serde::{Deserialize, Serialize};

/// The route map document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteMapResponse {
    pub routes: Vec<RouteDto>,
}

/// One departure station and everywhere it flies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    pub departure_station: StationRef,

    /// Missing when the station currently has no routes.
    #[serde(default)]
    pub arrival_stations: Option<Vec<StationRef>>,
}

/// A station reference by code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRef {
    pub id: String,
}

/// Body of the availability POST.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub flight_type: &'static str,
    pub origin: String,
    pub destination: String,
    /// `YYYY-MM-DD`.
    pub departure: String,
    /// Always empty for one-way queries.
    pub arrival: String,
    pub interval_subtype: Option<String>,
}

impl AvailabilityRequest {
    /// A one-way query for a single date.
    pub fn one_way(origin: &str, destination: &str, departure: &str) -> Self {
        Self {
            flight_type: "OW",
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure: departure.to_string(),
            arrival: String::new(),
            interval_subtype: None,
        }
    }
}

/// Successful availability response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    /// Null and absent both mean no flights.
    #[serde(default)]
    pub flights_outbound: Option<Vec<FlightDto>>,
}

/// One flight as the carrier reports it.
///
/// Date-times are local strings affected by the feed's offset defect; see
/// [`correct_feed_instant`](crate::domain::correct_feed_instant).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDto {
    pub departure_station: String,
    pub arrival_station: String,
    #[serde(default)]
    pub departure_station_text: Option<String>,
    #[serde(default)]
    pub arrival_station_text: Option<String>,
    #[serde(default)]
    pub flight_code: Option<String>,
    pub departure_date_time_iso: String,
    pub arrival_date_time_iso: String,
    pub departure_offset_text: String,
    pub arrival_offset_text: String,
}

/// Error body the carrier sends with HTTP 400.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
}

/// Application error code for "no flights on this route and date".
pub const CODE_NOT_AVAILABLE: &str = "error.availability";

/// Application error code for a search exception on the carrier side.
pub const CODE_SEARCH_EXCEPTION: &str = "PASS-0000";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(AvailabilityRequest::one_way("BUD", "LTN", "2025-03-01"))
            .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "flightType": "OW",
                "origin": "BUD",
                "destination": "LTN",
                "departure": "2025-03-01",
                "arrival": "",
                "intervalSubtype": null
            })
        );
    }

    #[test]
    fn parse_availability_response() {
        let json = r#"{
            "flightsOutbound": [{
                "departureStation": "BUD",
                "arrivalStation": "LTN",
                "departureStationText": "Budapest",
                "arrivalStationText": "London Luton",
                "flightCode": "W6 2201",
                "departureDateTimeIso": "2025-03-01T08:00:00",
                "arrivalDateTimeIso": "2025-03-01T09:40:00",
                "departureOffsetText": "UTC+1",
                "arrivalOffsetText": "UTC",
                "somethingElse": 42
            }],
            "flightsReturn": []
        }"#;

        let resp: AvailabilityResponse = serde_json::from_str(json).unwrap();
        let flights = resp.flights_outbound.unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].flight_code.as_deref(), Some("W6 2201"));
        assert_eq!(flights[0].departure_offset_text, "UTC+1");
    }

    #[test]
    fn null_flights_is_none() {
        let resp: AvailabilityResponse =
            serde_json::from_str(r#"{"flightsOutbound": null}"#).unwrap();
        assert!(resp.flights_outbound.is_none());

        let resp: AvailabilityResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.flights_outbound.is_none());
    }

    #[test]
    fn parse_route_map() {
        let json = r#"{"routes": [
            {"departureStation": {"id": "BUD"}, "arrivalStations": [{"id": "LTN"}, {"id": "WAW"}]},
            {"departureStation": {"id": "SKP"}}
        ]}"#;
        let resp: RouteMapResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.routes.len(), 2);
        assert_eq!(resp.routes[0].arrival_stations.as_ref().unwrap().len(), 2);
        assert!(resp.routes[1].arrival_stations.is_none());
    }

    #[test]
    fn parse_error_body() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"code":"error.availability"}"#).unwrap();
        assert_eq!(body.code.as_deref(), Some(CODE_NOT_AVAILABLE));
    }
}
