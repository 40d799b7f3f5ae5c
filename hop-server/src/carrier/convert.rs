//! Conversion from carrier DTOs to domain types.
//!
//! Flight instants are corrected for the feed's offset defect here, so
//! nothing past this module ever sees a raw feed instant.

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::{
    AirportCode, FeedOffset, FlightLeg, RouteMap, correct_feed_instant, parse_feed_datetime,
};

use super::types::{FlightDto, RouteMapResponse};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// Failed to parse an airport code
    #[error("invalid airport code: {0}")]
    InvalidAirport(String),

    /// Failed to parse a date-time
    #[error("invalid date-time: {0}")]
    InvalidDateTime(String),

    /// Failed to parse a timezone label
    #[error("invalid offset: {0}")]
    InvalidOffset(String),

    /// The converted leg is malformed
    #[error("invalid flight: {0}")]
    InvalidFlight(String),
}

/// Convert one flight found by the query for `search_date`.
pub fn convert_flight(dto: &FlightDto, search_date: NaiveDate) -> Result<FlightLeg, ConversionError> {
    let origin = parse_airport(&dto.departure_station)?;
    let destination = parse_airport(&dto.arrival_station)?;

    let departure_offset = parse_offset(&dto.departure_offset_text)?;
    let arrival_offset = parse_offset(&dto.arrival_offset_text)?;

    let departure = parse_feed_datetime(&dto.departure_date_time_iso)
        .map_err(|_| ConversionError::InvalidDateTime(dto.departure_date_time_iso.clone()))?;
    let arrival = parse_feed_datetime(&dto.arrival_date_time_iso)
        .map_err(|_| ConversionError::InvalidDateTime(dto.arrival_date_time_iso.clone()))?;

    let leg = FlightLeg {
        origin,
        destination,
        origin_name: dto
            .departure_station_text
            .clone()
            .unwrap_or_else(|| origin.to_string()),
        destination_name: dto
            .arrival_station_text
            .clone()
            .unwrap_or_else(|| destination.to_string()),
        flight_code: dto.flight_code.clone().unwrap_or_default(),
        departure: correct_feed_instant(departure, departure_offset),
        arrival: correct_feed_instant(arrival, arrival_offset),
        departure_offset,
        arrival_offset,
        search_date,
    };

    leg.validate()
        .map_err(|e| ConversionError::InvalidFlight(e.to_string()))?;

    Ok(leg)
}

/// Convert an availability response, skipping flights that fail to convert.
pub fn convert_flights(dtos: &[FlightDto], search_date: NaiveDate) -> Vec<FlightLeg> {
    dtos.iter()
        .filter_map(|dto| match convert_flight(dto, search_date) {
            Ok(leg) => Some(leg),
            Err(e) => {
                warn!(
                    origin = %dto.departure_station,
                    destination = %dto.arrival_station,
                    error = %e,
                    "Skipping unconvertible flight"
                );
                None
            }
        })
        .collect()
}

/// Convert the route map document.
///
/// Rows or destinations with unparseable codes are skipped.
pub fn convert_route_map(resp: &RouteMapResponse) -> RouteMap {
    let mut map = RouteMap::new();

    for route in &resp.routes {
        let Ok(from) = AirportCode::parse_normalized(&route.departure_station.id) else {
            warn!(station = %route.departure_station.id, "Skipping route row with bad code");
            continue;
        };
        map.add_airport(from);

        for station in route.arrival_stations.iter().flatten() {
            match AirportCode::parse_normalized(&station.id) {
                Ok(to) => map.add(from, to),
                Err(_) => warn!(station = %station.id, "Skipping destination with bad code"),
            }
        }
    }

    map
}

fn parse_airport(s: &str) -> Result<AirportCode, ConversionError> {
    AirportCode::parse_normalized(s).map_err(|_| ConversionError::InvalidAirport(s.to_string()))
}

fn parse_offset(s: &str) -> Result<FeedOffset, ConversionError> {
    FeedOffset::parse(s).map_err(|_| ConversionError::InvalidOffset(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::types::{RouteDto, StationRef};
    use chrono::NaiveDateTime;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn dto() -> FlightDto {
        FlightDto {
            departure_station: "BUD".into(),
            arrival_station: "LTN".into(),
            departure_station_text: Some("Budapest".into()),
            arrival_station_text: Some("London Luton".into()),
            flight_code: Some("W6 2201".into()),
            departure_date_time_iso: "2025-03-01T08:00:00".into(),
            arrival_date_time_iso: "2025-03-01T09:40:00".into(),
            departure_offset_text: "UTC+1".into(),
            arrival_offset_text: "UTC".into(),
        }
    }

    #[test]
    fn converts_and_corrects_offsets() {
        let leg = convert_flight(&dto(), date()).unwrap();

        assert_eq!(leg.origin.as_str(), "BUD");
        assert_eq!(leg.destination.as_str(), "LTN");
        assert_eq!(leg.origin_name, "Budapest");
        assert_eq!(leg.flight_code, "W6 2201");
        // UTC+1 reported as 08:00 means 06:00 UTC
        assert_eq!(leg.departure, dt("2025-03-01 06:00"));
        assert_eq!(leg.arrival, dt("2025-03-01 09:40"));
        assert_eq!(leg.departure_offset, FeedOffset::from_hours(1));
        assert_eq!(leg.search_date, date());
    }

    #[test]
    fn missing_names_fall_back_to_codes() {
        let mut d = dto();
        d.departure_station_text = None;
        d.flight_code = None;
        let leg = convert_flight(&d, date()).unwrap();
        assert_eq!(leg.origin_name, "BUD");
        assert_eq!(leg.flight_code, "");
    }

    #[test]
    fn rejects_bad_fields() {
        let mut d = dto();
        d.departure_station = "BUDAPEST".into();
        assert!(matches!(
            convert_flight(&d, date()),
            Err(ConversionError::InvalidAirport(_))
        ));

        let mut d = dto();
        d.arrival_offset_text = "CET".into();
        assert!(matches!(
            convert_flight(&d, date()),
            Err(ConversionError::InvalidOffset(_))
        ));

        let mut d = dto();
        d.departure_date_time_iso = "tomorrow".into();
        assert!(matches!(
            convert_flight(&d, date()),
            Err(ConversionError::InvalidDateTime(_))
        ));
    }

    #[test]
    fn convert_flights_skips_bad_rows() {
        let mut bad = dto();
        bad.arrival_station = "??".into();
        let legs = convert_flights(&[dto(), bad], date());
        assert_eq!(legs.len(), 1);
    }

    #[test]
    fn route_map_conversion() {
        let resp = RouteMapResponse {
            routes: vec![
                RouteDto {
                    departure_station: StationRef { id: "BUD".into() },
                    arrival_stations: Some(vec![
                        StationRef { id: "LTN".into() },
                        StationRef { id: "bad!".into() },
                    ]),
                },
                RouteDto {
                    departure_station: StationRef { id: "SKP".into() },
                    arrival_stations: None,
                },
            ],
        };

        let map = convert_route_map(&resp);
        let bud = AirportCode::parse("BUD").unwrap();
        let skp = AirportCode::parse("SKP").unwrap();
        assert_eq!(map.destinations(&bud).map(|d| d.len()), Some(1));
        assert_eq!(map.destinations(&skp).map(|d| d.len()), Some(0));
    }
}
