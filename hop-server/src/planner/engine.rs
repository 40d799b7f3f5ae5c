//! Breadth-first hop search.
//!
//! The engine expands one hop at a time from a FIFO queue. Each queued
//! [`HopState`] names the airport we are at, the airport to query next and
//! the window the next leg has to depart in. Processing a state issues one
//! availability query and yields completed itineraries, successor states,
//! or (when nothing connects) a retry of the same hop on the following day.
//!
//! Two strategies feed the queue:
//!
//! - unconstrained: candidate destinations come from the route map at every
//!   hop, skipping airports already visited
//! - via-constrained: every airport path from origin to arrival through
//!   permitted connection airports is discovered from the route map up
//!   front, then each path is searched with its destinations pinned

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, trace, warn};

use crate::domain::{AirportCode, AssemblyContext, FlightLeg, Itinerary, NextWindow, RouteMap, SearchParams, Via};

use super::availability::AvailabilityClient;
use super::control::SearchControl;
use super::error::SearchError;
use super::provider::{AvailabilitySource, RouteSource};
use super::resolver::RouteResolver;

/// A single one-way search, with request parameters already clamped.
#[derive(Debug, Clone)]
pub struct HopRequest {
    pub origin: AirportCode,
    /// `None` searches every direct destination of `origin`.
    pub arrival: Option<AirportCode>,
    pub date: NaiveDate,
    pub params: SearchParams,
    /// Lower bound for the first leg's departure (used by return searches).
    pub earliest_departure: Option<NaiveDateTime>,
    /// How many later days a layover may still spill into.
    pub day_budget: u32,
}

impl HopRequest {
    /// Without an arrival there is nothing to connect towards, so only
    /// direct flights are searched.
    fn normalized(&self) -> Self {
        let mut request = self.clone();
        if request.arrival.is_none() {
            request.params.hop_budget = 1;
        }
        request.params.hop_budget = request.params.hop_budget.max(1);
        request
    }

    fn uses_via_plans(&self) -> bool {
        self.arrival.is_some() && self.params.via.is_constrained()
    }
}

/// One unit of queued work.
#[derive(Debug, Clone)]
pub struct HopState {
    /// Where the next leg departs from.
    pub origin: AirportCode,
    /// Where the next leg goes; `None` until expanded from the route map.
    pub destination: Option<AirportCode>,
    pub arrival: Option<AirportCode>,
    /// Date the availability query is made for.
    pub date: NaiveDate,
    pub earliest_departure: Option<NaiveDateTime>,
    pub latest_departure: Option<NaiveDateTime>,
    /// Legs confirmed so far.
    pub legs: Vec<FlightLeg>,
    /// Legs still allowed, including the next one.
    pub hops_left: u8,
    pub days_left: u32,
    /// Pinned airport path, for via-constrained searches.
    pub plan: Option<Arc<[AirportCode]>>,
}

impl HopState {
    fn initial(request: &HopRequest) -> Self {
        Self {
            origin: request.origin,
            destination: None,
            arrival: request.arrival,
            date: request.date,
            earliest_departure: request.earliest_departure,
            latest_departure: None,
            legs: Vec::new(),
            hops_left: request.params.hop_budget,
            days_left: request.day_budget,
            plan: None,
        }
    }

    fn planned(request: &HopRequest, plan: Arc<[AirportCode]>) -> Self {
        Self {
            destination: plan.get(1).copied(),
            plan: Some(plan),
            ..Self::initial(request)
        }
    }

    fn has_visited(&self, airport: &AirportCode) -> bool {
        self.origin == *airport
            || self
                .legs
                .iter()
                .any(|leg| leg.origin == *airport || leg.destination == *airport)
    }

    fn with_destination(&self, destination: AirportCode) -> Self {
        Self {
            destination: Some(destination),
            ..self.clone()
        }
    }

    /// The same hop one day later, if the day budget allows it.
    fn next_day(&self) -> Option<Self> {
        if self.days_left == 0 {
            return None;
        }
        Some(Self {
            date: self.date.succ_opt()?,
            days_left: self.days_left - 1,
            ..self.clone()
        })
    }

    /// The pinned destination after `legs_taken` legs.
    fn planned_destination(&self, legs_taken: usize) -> Option<AirportCode> {
        self.plan
            .as_ref()
            .and_then(|plan| plan.get(legs_taken + 1).copied())
    }

    fn describe(&self) -> String {
        let destination = self
            .destination
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string());
        match &self.plan {
            Some(plan) => format!(
                "Checking {} to {} on {} (itinerary {})",
                self.origin,
                destination,
                self.date,
                plan.iter().map(ToString::to_string).collect::<Vec<_>>().join("-")
            ),
            None => format!("Checking {} to {} on {}", self.origin, destination, self.date),
        }
    }
}

/// What processing one state produced.
#[derive(Debug, Default)]
struct HopOutcome {
    completed: Vec<Itinerary>,
    successors: Vec<HopState>,
    /// The query failed; the branch is dropped without a retry.
    aborted: bool,
}

/// Every simple airport path from `origin` to `arrival` using at most
/// `hop_budget` legs, with intermediates permitted by `via`.
///
/// Paths come out shortest first. Airports without route data end a path.
pub fn discover_paths(
    routes: &RouteMap,
    origin: AirportCode,
    arrival: AirportCode,
    hop_budget: u8,
    via: &Via,
) -> Vec<Vec<AirportCode>> {
    let budget = usize::from(hop_budget.max(1));
    let mut queue = VecDeque::from([vec![origin]]);
    let mut paths = Vec::new();

    while let Some(path) = queue.pop_front() {
        let Some(last) = path.last() else { continue };
        let Some(reachable) = routes.destinations(last) else {
            trace!(airport = %last, "No route data, path ends");
            continue;
        };
        let legs_used = path.len() - 1;

        for next in reachable {
            if *next == arrival {
                let mut complete = path.clone();
                complete.push(*next);
                paths.push(complete);
            } else if legs_used + 1 < budget && via.permits(next) && !path.contains(next) {
                let mut longer = path.clone();
                longer.push(*next);
                queue.push_back(longer);
            }
        }
    }

    paths
}

/// The hop search engine.
pub struct HopEngine<'a, R, A> {
    resolver: &'a RouteResolver<R>,
    availability: &'a AvailabilityClient<A>,
}

impl<'a, R: RouteSource, A: AvailabilitySource> HopEngine<'a, R, A> {
    pub fn new(resolver: &'a RouteResolver<R>, availability: &'a AvailabilityClient<A>) -> Self {
        Self {
            resolver,
            availability,
        }
    }

    /// Run one search to completion, cancellation or throttling.
    ///
    /// Itineraries are recorded on `control` (and so emitted) as they are
    /// found; the ones found by this run are also returned. Throttling ends
    /// the search early with whatever was found; per-leg failures drop
    /// their branch and are recorded on `control`.
    pub async fn run(
        &self,
        request: &HopRequest,
        control: &mut SearchControl,
    ) -> Result<Vec<Itinerary>, SearchError> {
        let request = request.normalized();
        self.verify(&request).await?;

        info!(
            origin = %request.origin,
            arrival = ?request.arrival,
            date = %request.date,
            hop_budget = request.params.hop_budget,
            via = %request.params.via,
            "Starting hop search"
        );

        let mut found = Vec::new();
        if request.uses_via_plans() {
            self.run_planned(&request, control, &mut found).await?;
        } else {
            let mut queue = VecDeque::new();
            self.enqueue(&mut queue, HopState::initial(&request), &request, control)
                .await?;
            self.drain(queue, &request, control, &mut found).await?;
        }

        info!(
            found = found.len(),
            queries = control.queries_issued(),
            rate_limited = control.is_rate_limited(),
            "Hop search finished"
        );
        Ok(found)
    }

    /// Check every named airport has route data, and that a direct-only
    /// search can reach its arrival at all.
    async fn verify(&self, request: &HopRequest) -> Result<(), SearchError> {
        if request.arrival == Some(request.origin) {
            return Err(SearchError::InvalidRequest(
                "origin and arrival must differ".to_string(),
            ));
        }

        self.resolver.verify(&request.origin).await?;
        for via in request.params.via.listed() {
            self.resolver.verify(via).await?;
        }

        if let Some(arrival) = request.arrival {
            self.resolver.verify(&arrival).await?;

            if request.params.hop_budget == 1 && !request.params.via.is_constrained() {
                let direct = self.resolver.resolve(&request.origin).await?;
                if !direct.contains(&arrival) {
                    return Err(SearchError::NoDirectRoute {
                        origin: request.origin,
                        arrival,
                    });
                }
            }
        }
        Ok(())
    }

    async fn run_planned(
        &self,
        request: &HopRequest,
        control: &mut SearchControl,
        found: &mut Vec<Itinerary>,
    ) -> Result<(), SearchError> {
        let Some(arrival) = request.arrival else {
            return Ok(());
        };

        let routes = self.resolver.route_map().await?;
        let paths = discover_paths(
            &routes,
            request.origin,
            arrival,
            request.params.hop_budget,
            &request.params.via,
        );
        debug!(count = paths.len(), "Discovered itinerary plans");
        control.progress(format!(
            "Found {} possible itineraries from {} to {}",
            paths.len(),
            request.origin,
            arrival
        ));

        for path in paths {
            if control.should_stop() {
                break;
            }
            let state = HopState::planned(request, path.into());
            let mut queue = VecDeque::new();
            self.enqueue(&mut queue, state, request, control).await?;
            self.drain(queue, request, control, found).await?;
        }
        Ok(())
    }

    /// Queue `state`, expanding it over the route map when it has no
    /// destination yet.
    async fn enqueue(
        &self,
        queue: &mut VecDeque<HopState>,
        state: HopState,
        request: &HopRequest,
        control: &mut SearchControl,
    ) -> Result<(), SearchError> {
        if state.destination.is_some() {
            control.expect_hops(1);
            queue.push_back(state);
            return Ok(());
        }
        if state.plan.is_some() {
            // A plan always pins the next airport
            return Ok(());
        }

        let destinations = self.next_airports(&state, &request.params).await?;
        trace!(origin = %state.origin, count = destinations.len(), "Expanded hop");
        control.expect_hops(destinations.len());
        queue.extend(destinations.into_iter().map(|d| state.with_destination(d)));
        Ok(())
    }

    /// Candidate next airports from the state's current airport.
    async fn next_airports(
        &self,
        state: &HopState,
        params: &SearchParams,
    ) -> Result<Vec<AirportCode>, SearchError> {
        let reachable: BTreeSet<AirportCode> = match self.resolver.resolve(&state.origin).await {
            Ok(reachable) => reachable,
            Err(SearchError::NoRouteData(airport)) => {
                debug!(%airport, "No route data, branch ends");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let Some(arrival) = state.arrival else {
            return Ok(reachable.into_iter().collect());
        };

        let mut next = Vec::new();
        if reachable.contains(&arrival) {
            next.push(arrival);
        }
        if state.hops_left > 1 {
            next.extend(
                reachable
                    .into_iter()
                    .filter(|d| *d != arrival && !state.has_visited(d) && params.via.permits(d)),
            );
        }
        Ok(next)
    }

    async fn drain(
        &self,
        mut queue: VecDeque<HopState>,
        request: &HopRequest,
        control: &mut SearchControl,
        found: &mut Vec<Itinerary>,
    ) -> Result<(), SearchError> {
        while let Some(state) = queue.pop_front() {
            if control.should_stop() {
                debug!(pending = queue.len() + 1, "Search stopped");
                break;
            }

            let outcome = self.process_hop(&state, &request.params, control).await?;
            let dead_end = outcome.completed.is_empty() && outcome.successors.is_empty();

            for itinerary in outcome.completed {
                control.record(itinerary.clone());
                found.push(itinerary);
            }
            for successor in outcome.successors {
                self.enqueue(&mut queue, successor, request, control).await?;
            }

            control.complete_hop();
            control.progress(state.describe());
            tokio::time::sleep(self.availability.pacing().hop_delay).await;

            if dead_end
                && !outcome.aborted
                && !state.legs.is_empty()
                && !control.should_stop()
                && let Some(retry) = state.next_day()
            {
                debug!(
                    origin = %retry.origin,
                    destination = ?retry.destination,
                    date = %retry.date,
                    "No connection, retrying next day"
                );
                self.enqueue(&mut queue, retry, request, control).await?;
            }
        }
        Ok(())
    }

    /// Query the state's hop and turn every admissible leg into either a
    /// completed itinerary or a successor state.
    async fn process_hop(
        &self,
        state: &HopState,
        params: &SearchParams,
        control: &mut SearchControl,
    ) -> Result<HopOutcome, SearchError> {
        let mut outcome = HopOutcome::default();
        let Some(destination) = state.destination else {
            return Ok(outcome);
        };

        let legs = match self
            .availability
            .query(&state.origin, &destination, state.date, control)
            .await
        {
            Ok(legs) => legs,
            Err(SearchError::RateLimited) => {
                outcome.aborted = true;
                return Ok(outcome);
            }
            Err(e @ SearchError::Availability { .. }) => {
                warn!(error = %e, "Availability query failed, dropping branch");
                control.record_error(e);
                outcome.aborted = true;
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        };

        for leg in legs {
            if leg.origin != state.origin || leg.destination != destination {
                trace!(flight = %leg.flight_code, "Leg does not match the queried route");
                continue;
            }
            if state.earliest_departure.is_some_and(|earliest| leg.departure < earliest) {
                trace!(flight = %leg.flight_code, "Departs before the layover ends");
                continue;
            }
            if state.latest_departure.is_some_and(|latest| leg.departure > latest) {
                trace!(flight = %leg.flight_code, "Departs after the maximum layover");
                continue;
            }

            let window = NextWindow::after(leg.arrival, params);
            let next_date = leg.arrival_offset.local_date(window.earliest_departure);
            let days_left = if next_date == state.date {
                state.days_left
            } else {
                state.days_left.saturating_sub(1)
            };

            let mut legs = state.legs.clone();
            let reached = leg.destination;
            legs.push(leg);

            match state.arrival {
                Some(arrival) if reached != arrival => {
                    if state.hops_left > 1 {
                        outcome.successors.push(HopState {
                            origin: reached,
                            destination: state.planned_destination(legs.len()),
                            arrival: state.arrival,
                            date: next_date,
                            earliest_departure: Some(window.earliest_departure),
                            latest_departure: window.latest_departure,
                            hops_left: state.hops_left - 1,
                            days_left,
                            plan: state.plan.clone(),
                            legs,
                        });
                    }
                }
                _ => {
                    let context = AssemblyContext {
                        next_window: window,
                        days_left,
                        params: params.clone(),
                    };
                    match Itinerary::assemble(legs, context) {
                        Ok(itinerary) => outcome.completed.push(itinerary),
                        Err(e) => warn!(error = %e, "Discarding malformed itinerary"),
                    }
                }
            }
        }

        Ok(outcome)
    }
}
