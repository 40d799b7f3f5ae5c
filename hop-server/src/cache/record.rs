//! Payload stored in the itinerary namespace.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Itinerary, RoundTrip};

/// Return options found for one outbound itinerary, grouped by return date.
pub type ReturnsByDate = BTreeMap<NaiveDate, Vec<RoundTrip>>;

/// An outbound itinerary and the return options found for it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripEntry {
    pub outbound: Itinerary,
    #[serde(default)]
    pub returns: Option<ReturnsByDate>,
}

impl TripEntry {
    pub fn new(outbound: Itinerary) -> Self {
        Self {
            outbound,
            returns: None,
        }
    }
}

/// What a finished one-way search left in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItineraryRecord {
    /// The record expired or was marked stale; the next search must bypass
    /// cached flight data written before it started.
    Refresh,
    /// The search finished and found nothing.
    NoResult(String),
    /// Itineraries grouped by departure date.
    Results(BTreeMap<NaiveDate, Vec<TripEntry>>),
}

impl ItineraryRecord {
    /// Group itineraries by their departure date.
    pub fn from_itineraries(itineraries: impl IntoIterator<Item = Itinerary>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<TripEntry>> = BTreeMap::new();
        for it in itineraries {
            by_date
                .entry(it.departure_date())
                .or_default()
                .push(TripEntry::new(it));
        }
        ItineraryRecord::Results(by_date)
    }

    /// Number of outbound itineraries held.
    pub fn itinerary_count(&self) -> usize {
        match self {
            ItineraryRecord::Results(by_date) => by_date.values().map(Vec::len).sum(),
            _ => 0,
        }
    }

    /// All outbound itineraries, in date order.
    pub fn itineraries(&self) -> impl Iterator<Item = &Itinerary> {
        let by_date = match self {
            ItineraryRecord::Results(by_date) => Some(by_date),
            _ => None,
        };
        by_date
            .into_iter()
            .flat_map(|m| m.values())
            .flatten()
            .map(|entry| &entry.outbound)
    }

    /// Replace the returns stored for the outbound itinerary `outbound_id`.
    ///
    /// Returns `false` when no entry with that id exists.
    pub fn set_returns(&mut self, outbound_id: Uuid, returns: ReturnsByDate) -> bool {
        let ItineraryRecord::Results(by_date) = self else {
            return false;
        };
        let entry = by_date
            .values_mut()
            .flatten()
            .find(|entry| entry.outbound.id() == outbound_id);
        match entry {
            Some(entry) => {
                entry.returns = Some(returns);
                true
            }
            None => false,
        }
    }
}
