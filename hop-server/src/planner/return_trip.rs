//! Return searches for an outbound itinerary.

use std::time::Duration;

use chrono::{Days, NaiveDate};
use tracing::info;

use crate::cache::ReturnsByDate;
use crate::domain::{Itinerary, NextWindow, RoundTrip};

use super::control::{SearchControl, SearchEvent};
use super::engine::{HopEngine, HopRequest};
use super::error::SearchError;
use super::provider::{AvailabilitySource, RouteSource};

/// Request for the ways back from an outbound itinerary's destination.
#[derive(Debug, Clone)]
pub struct ReturnRequest {
    pub outbound: Itinerary,
    /// First date to look on. Dates before the outbound arrival are moved
    /// up to it.
    pub return_date: Option<NaiveDate>,
    /// Later dates to look on after the first one.
    pub day_budget: Option<u32>,
}

impl ReturnRequest {
    /// The first return date and the number of following dates to search.
    pub fn schedule(&self) -> (NaiveDate, u32) {
        let arrival_date = self.outbound.arrival_date();
        match self.return_date {
            Some(date) if date >= arrival_date => (
                date,
                self.day_budget.unwrap_or_else(|| self.outbound.days_left()),
            ),
            _ => (arrival_date, self.outbound.days_left()),
        }
    }

    /// The one-way search for the way back on `date`.
    ///
    /// The earliest departure is recomputed from the outbound's last
    /// arrival rather than taken from its stored window.
    fn hop_request(&self, date: NaiveDate, day_budget: u32) -> HopRequest {
        let window = NextWindow::after(self.outbound.arrival(), self.outbound.params());
        HopRequest {
            origin: *self.outbound.destination(),
            arrival: Some(*self.outbound.origin()),
            date,
            params: self.outbound.params().clone(),
            earliest_departure: Some(window.earliest_departure),
            day_budget,
        }
    }
}

/// Runs one hop search per return date and pairs the results with the
/// outbound itinerary.
pub struct ReturnPlanner<'a, R, A> {
    engine: HopEngine<'a, R, A>,
    date_delay: Duration,
}

impl<'a, R: RouteSource, A: AvailabilitySource> ReturnPlanner<'a, R, A> {
    pub fn new(engine: HopEngine<'a, R, A>, date_delay: Duration) -> Self {
        Self { engine, date_delay }
    }

    /// Search every scheduled return date.
    ///
    /// Each pairing is emitted as [`SearchEvent::RoundTrip`] as soon as it
    /// is found. Results are grouped by the return's departure date.
    pub async fn run(
        &self,
        request: &ReturnRequest,
        control: &mut SearchControl,
    ) -> Result<ReturnsByDate, SearchError> {
        let outbound = &request.outbound;
        let (start, extra_days) = request.schedule();
        info!(
            outbound = %outbound.id(),
            from = %outbound.destination(),
            to = %outbound.origin(),
            %start,
            extra_days,
            "Searching return flights"
        );

        let mut returns = ReturnsByDate::new();
        let mut days_left = extra_days;

        for offset in 0..=extra_days {
            if control.should_stop() {
                break;
            }
            let Some(date) = start.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };

            control.progress(format!("Checking return flights on {date}"));
            let found = self
                .engine
                .run(&request.hop_request(date, days_left), control)
                .await?;

            for inbound in found {
                let trip = RoundTrip::pair(outbound, inbound);
                control.emit(SearchEvent::RoundTrip { trip: trip.clone() });
                returns
                    .entry(trip.inbound.departure_date())
                    .or_default()
                    .push(trip);
            }

            days_left = days_left.saturating_sub(1);
            if offset < extra_days {
                tokio::time::sleep(self.date_delay).await;
            }
        }

        Ok(returns)
    }
}
