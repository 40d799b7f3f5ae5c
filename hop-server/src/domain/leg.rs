//! Flight legs.
//!
//! A `FlightLeg` is one scheduled flight between two airports, as returned
//! by a single availability query. Instants are true UTC (already corrected
//! for the feed's offset defect); the feed offsets are kept for display and
//! for working out local calendar dates.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{AirportCode, DomainError, FeedOffset};

/// One scheduled flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightLeg {
    /// Departure airport.
    pub origin: AirportCode,
    /// Arrival airport.
    pub destination: AirportCode,
    /// Human-readable departure station name.
    pub origin_name: String,
    /// Human-readable arrival station name.
    pub destination_name: String,
    /// Carrier flight code, e.g. `W6 2201`.
    pub flight_code: String,
    /// Scheduled departure (UTC).
    pub departure: NaiveDateTime,
    /// Scheduled arrival (UTC).
    pub arrival: NaiveDateTime,
    /// Timezone of the departure airport.
    pub departure_offset: FeedOffset,
    /// Timezone of the arrival airport.
    pub arrival_offset: FeedOffset,
    /// The date the availability query was made for.
    pub search_date: NaiveDate,
}

impl FlightLeg {
    /// Validates the leg's basic shape.
    ///
    /// # Errors
    ///
    /// Returns `Err` if origin equals destination or the flight arrives
    /// before it departs.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.origin == self.destination {
            return Err(DomainError::InvalidLeg("origin and destination are the same"));
        }
        if self.arrival < self.departure {
            return Err(DomainError::InvalidLeg("arrival precedes departure"));
        }
        Ok(())
    }

    /// Scheduled flight time.
    pub fn duration(&self) -> Duration {
        self.arrival.signed_duration_since(self.departure)
    }

    /// Local wall-clock departure at the origin.
    pub fn local_departure(&self) -> NaiveDateTime {
        self.departure_offset.to_local(self.departure)
    }

    /// Local wall-clock arrival at the destination.
    pub fn local_arrival(&self) -> NaiveDateTime {
        self.arrival_offset.to_local(self.arrival)
    }

    /// Departure shown the way travellers read it: `"10:15 (UTC+1)"`.
    pub fn departure_text(&self) -> String {
        format!(
            "{} ({})",
            self.local_departure().format("%H:%M"),
            self.departure_offset
        )
    }

    /// Arrival shown the way travellers read it: `"12:40 (UTC+2)"`.
    pub fn arrival_text(&self) -> String {
        format!(
            "{} ({})",
            self.local_arrival().format("%H:%M"),
            self.arrival_offset
        )
    }

    /// One-line summary: `"BUD (Budapest) to LTN (London Luton) - W6 2201"`.
    pub fn route_text(&self) -> String {
        format!(
            "{} ({}) to {} ({}) - {}",
            self.origin, self.origin_name, self.destination, self.destination_name, self.flight_code
        )
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn code(s: &str) -> AirportCode {
        AirportCode::parse(s).unwrap()
    }

    pub fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    /// Instant on `date()` plus `day_offset` days, at "HH:MM" UTC.
    pub fn at(day_offset: i64, hhmm: &str) -> NaiveDateTime {
        let (h, m) = hhmm.split_once(':').unwrap();
        (date() + Duration::days(day_offset))
            .and_hms_opt(h.parse().unwrap(), m.parse().unwrap(), 0)
            .unwrap()
    }

    /// A UTC leg found on the search for `date() + day_offset`.
    pub fn leg(from: &str, to: &str, day_offset: i64, dep: &str, arr: &str) -> FlightLeg {
        FlightLeg {
            origin: code(from),
            destination: code(to),
            origin_name: format!("{from} Airport"),
            destination_name: format!("{to} Airport"),
            flight_code: format!("W6 {from}{to}"),
            departure: at(day_offset, dep),
            arrival: at(day_offset, arr),
            departure_offset: FeedOffset::UTC,
            arrival_offset: FeedOffset::UTC,
            search_date: date() + Duration::days(day_offset),
        }
    }
}
