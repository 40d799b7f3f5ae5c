//! Itinerary types.
//!
//! An `Itinerary` is a complete one-way trip made of one or more flight
//! legs. Besides the legs it carries everything needed to present it and to
//! derive a return search from it: the next-leg window computed from its
//! last arrival, the remaining day budget, and the parameters it was found
//! under.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AirportCode, DomainError, FlightLeg, Via, format_duration};

/// The search parameters an itinerary was produced under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Maximum number of legs.
    pub hop_budget: u8,
    /// Minimum ground time between legs, in hours.
    pub min_layover_hours: i64,
    /// Maximum ground time between legs, in hours.
    pub max_layover_hours: Option<i64>,
    /// Allowed connection airports.
    pub via: Via,
}

impl SearchParams {
    /// Minimum layover as a Duration.
    pub fn min_layover(&self) -> Duration {
        Duration::hours(self.min_layover_hours)
    }

    /// Maximum layover as a Duration, if configured.
    pub fn max_layover(&self) -> Option<Duration> {
        self.max_layover_hours.map(Duration::hours)
    }
}

/// When the leg after some arrival may depart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextWindow {
    /// Arrival plus minimum layover.
    pub earliest_departure: NaiveDateTime,
    /// Arrival plus maximum layover, if a ceiling is configured.
    pub latest_departure: Option<NaiveDateTime>,
}

impl NextWindow {
    /// Window following an arrival at `arrival`.
    pub fn after(arrival: NaiveDateTime, params: &SearchParams) -> Self {
        Self {
            earliest_departure: arrival + params.min_layover(),
            latest_departure: params.max_layover().map(|max| arrival + max),
        }
    }

    /// Whether a departure at `departure` fits in this window.
    pub fn admits(&self, departure: NaiveDateTime) -> bool {
        departure >= self.earliest_departure
            && self.latest_departure.is_none_or(|latest| departure <= latest)
    }
}

/// Everything the assembler needs besides the legs.
#[derive(Debug, Clone)]
pub struct AssemblyContext {
    /// Next-leg window after the final arrival.
    pub next_window: NextWindow,
    /// Day budget left after the final leg.
    pub days_left: u32,
    /// Parameters of the search.
    pub params: SearchParams,
}

/// A complete one-way trip.
///
/// # Invariants
///
/// - At least one leg
/// - Consecutive legs connect (arrival airport = next departure airport)
/// - No leg departs before the previous one arrives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    id: Uuid,
    legs: Vec<FlightLeg>,
    route: String,
    stops_text: String,
    duration_text: String,
    next_window: NextWindow,
    days_left: u32,
    params: SearchParams,
}

impl Itinerary {
    /// Builds an itinerary from a confirmed leg sequence.
    ///
    /// A fresh identity is generated for every call; two itineraries over
    /// the same legs are still distinct records.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the sequence is empty, a leg is malformed, legs
    /// don't connect, or a leg departs before its predecessor arrives.
    pub fn assemble(legs: Vec<FlightLeg>, context: AssemblyContext) -> Result<Self, DomainError> {
        check_legs(&legs)?;

        let first = &legs[0];
        let last = &legs[legs.len() - 1];

        let route = format!(
            "{} ({}) to {} ({})",
            first.origin, first.origin_name, last.destination, last.destination_name
        );
        let stops_text = stops_text(legs.len() - 1);
        let duration_text = format_duration(last.arrival.signed_duration_since(first.departure));

        Ok(Self {
            id: Uuid::new_v4(),
            legs,
            route,
            stops_text,
            duration_text,
            next_window: context.next_window,
            days_left: context.days_left,
            params: context.params,
        })
    }

    /// Re-checks the leg invariants and the next-leg window, for
    /// itineraries that arrived through deserialization.
    pub fn revalidate(&self) -> Result<(), DomainError> {
        check_legs(&self.legs)?;
        if self.params.min_layover_hours < 0 {
            return Err(DomainError::InvalidWindow("negative minimum layover"));
        }
        let expected = NextWindow::after(self.arrival(), &self.params);
        if self.next_window.earliest_departure < expected.earliest_departure {
            return Err(DomainError::InvalidWindow(
                "next departure is earlier than the minimum layover allows",
            ));
        }
        Ok(())
    }

    /// Opaque identity of this record.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The legs in order.
    pub fn legs(&self) -> &[FlightLeg] {
        &self.legs
    }

    /// Number of legs.
    pub fn hops(&self) -> usize {
        self.legs.len()
    }

    /// Number of intermediate stops.
    pub fn stops(&self) -> usize {
        self.legs.len() - 1
    }

    /// `"Direct"`, `"1 stop"` or `"N stops"`.
    pub fn stops_text(&self) -> &str {
        &self.stops_text
    }

    /// `"BUD (Budapest) to LTN (London Luton)"`.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// First departure airport.
    pub fn origin(&self) -> &AirportCode {
        &self.legs[0].origin
    }

    /// Final arrival airport.
    pub fn destination(&self) -> &AirportCode {
        &self.legs[self.legs.len() - 1].destination
    }

    /// First departure (UTC).
    pub fn departure(&self) -> NaiveDateTime {
        self.legs[0].departure
    }

    /// Final arrival (UTC).
    pub fn arrival(&self) -> NaiveDateTime {
        self.legs[self.legs.len() - 1].arrival
    }

    /// Search date of the first leg; results are grouped by this.
    pub fn departure_date(&self) -> NaiveDate {
        self.legs[0].search_date
    }

    /// Local calendar date of the final arrival.
    pub fn arrival_date(&self) -> NaiveDate {
        self.legs[self.legs.len() - 1].local_arrival().date()
    }

    /// Elapsed time from first departure to final arrival.
    pub fn total_duration(&self) -> Duration {
        self.arrival().signed_duration_since(self.departure())
    }

    /// Formatted total duration, e.g. `"5h 40m"`.
    pub fn duration_text(&self) -> &str {
        &self.duration_text
    }

    /// Ground time at each connection.
    pub fn layovers(&self) -> Vec<Duration> {
        self.legs
            .windows(2)
            .map(|w| w[1].departure.signed_duration_since(w[0].arrival))
            .collect()
    }

    /// When a following leg (e.g. the return) may depart.
    pub fn next_window(&self) -> &NextWindow {
        &self.next_window
    }

    /// Day budget left after this itinerary.
    pub fn days_left(&self) -> u32 {
        self.days_left
    }

    /// Parameters this itinerary was found under.
    pub fn params(&self) -> &SearchParams {
        &self.params
    }
}

fn check_legs(legs: &[FlightLeg]) -> Result<(), DomainError> {
    if legs.is_empty() {
        return Err(DomainError::EmptyItinerary);
    }

    for leg in legs {
        leg.validate()?;
    }

    for window in legs.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        if prev.destination != next.origin {
            return Err(DomainError::LegsNotConnected(prev.destination, next.origin));
        }
        if next.departure < prev.arrival {
            return Err(DomainError::OverlappingLegs(next.origin));
        }
    }

    Ok(())
}

fn stops_text(stops: usize) -> String {
    match stops {
        0 => "Direct".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{n} stops"),
    }
}

/// An outbound itinerary paired with one way back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTrip {
    /// Identity of the outbound itinerary.
    pub outbound_id: Uuid,
    /// The return itinerary.
    pub inbound: Itinerary,
    /// Minutes between outbound arrival and return departure.
    pub time_at_destination_mins: i64,
    /// Formatted time at destination.
    pub time_at_destination_text: String,
}

impl RoundTrip {
    /// Pair an outbound itinerary with a return itinerary.
    pub fn pair(outbound: &Itinerary, inbound: Itinerary) -> Self {
        let stay = inbound.departure().signed_duration_since(outbound.arrival());
        Self {
            outbound_id: outbound.id(),
            time_at_destination_mins: stay.num_minutes(),
            time_at_destination_text: format_duration(stay),
            inbound,
        }
    }

    /// Time between landing and flying back.
    pub fn time_at_destination(&self) -> Duration {
        Duration::minutes(self.time_at_destination_mins)
    }
}
