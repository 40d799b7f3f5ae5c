//! Per-search session state.
//!
//! A `SearchControl` belongs to exactly one search invocation. It carries
//! the cancellation flag, the rate-limit flag, the query and progress
//! counters, and the results found so far, and it forwards progress to the
//! caller's [`EventSink`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{Itinerary, RoundTrip};

use super::error::SearchError;
use super::provider::{EventSink, NoopSink};

/// Shared cancellation flag.
///
/// Cloning shares the flag; the search checks it before each hop.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the search to stop at the next hop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An event delivered while a search runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    /// Human-readable progress with counters.
    Progress {
        message: String,
        hops_completed: u32,
        hops_expected: u32,
        queries_issued: u32,
    },
    /// A completed itinerary, emitted as soon as it is found.
    Itinerary { itinerary: Itinerary },
    /// A return option paired with its outbound itinerary.
    RoundTrip { trip: RoundTrip },
    /// The search ended.
    Finished(SearchSummary),
    /// The search could not run.
    Failed { error: String },
}

/// Final counts of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSummary {
    pub itineraries: usize,
    pub from_cache: bool,
    pub rate_limited: bool,
    pub cancelled: bool,
    /// Set when a finished search found nothing.
    pub no_result: Option<String>,
    /// Per-leg failures that aborted single branches.
    pub errors: Vec<String>,
}

/// Per-invocation search session.
pub struct SearchControl {
    started_at: DateTime<Utc>,
    cancel: CancelHandle,
    rate_limited: bool,
    force_refresh: bool,
    queries_issued: u32,
    hops_completed: u32,
    hops_expected: u32,
    results: BTreeMap<NaiveDate, Vec<Itinerary>>,
    errors: Vec<SearchError>,
    sink: Arc<dyn EventSink>,
}

impl SearchControl {
    /// Start a session reporting to `sink`.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            started_at: Utc::now(),
            cancel: CancelHandle::new(),
            rate_limited: false,
            force_refresh: false,
            queries_issued: 0,
            hops_completed: 0,
            hops_expected: 0,
            results: BTreeMap::new(),
            errors: Vec::new(),
            sink,
        }
    }

    /// Start a session that reports nowhere.
    pub fn detached() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    /// Share cancellation with `handle`.
    pub fn with_cancel(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    pub fn mark_rate_limited(&mut self) {
        self.rate_limited = true;
    }

    /// Whether the search must stop: cancelled or throttled.
    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.rate_limited
    }

    pub fn force_refresh(&self) -> bool {
        self.force_refresh
    }

    /// Bypass cached flight results written before this search started.
    pub fn set_force_refresh(&mut self, force: bool) {
        self.force_refresh = force;
    }

    pub fn queries_issued(&self) -> u32 {
        self.queries_issued
    }

    /// Count a live carrier query.
    pub fn note_query(&mut self) {
        self.queries_issued += 1;
    }

    pub fn hops_completed(&self) -> u32 {
        self.hops_completed
    }

    pub fn hops_expected(&self) -> u32 {
        self.hops_expected
    }

    /// Grow the expected hop count as work is enqueued.
    pub fn expect_hops(&mut self, n: usize) {
        self.hops_expected = self
            .hops_expected
            .saturating_add(u32::try_from(n).unwrap_or(u32::MAX));
    }

    /// Count a processed hop.
    pub fn complete_hop(&mut self) {
        self.hops_completed += 1;
    }

    /// Report progress with the current counters.
    pub fn progress(&self, message: impl Into<String>) {
        self.sink.emit(SearchEvent::Progress {
            message: message.into(),
            hops_completed: self.hops_completed,
            hops_expected: self.hops_expected,
            queries_issued: self.queries_issued,
        });
    }

    /// Record a completed itinerary and emit it.
    pub fn record(&mut self, itinerary: Itinerary) {
        self.sink.emit(SearchEvent::Itinerary {
            itinerary: itinerary.clone(),
        });
        self.results
            .entry(itinerary.departure_date())
            .or_default()
            .push(itinerary);
    }

    /// Forward an arbitrary event.
    pub fn emit(&self, event: SearchEvent) {
        self.sink.emit(event);
    }

    /// Results found so far, grouped by departure date.
    pub fn results(&self) -> &BTreeMap<NaiveDate, Vec<Itinerary>> {
        &self.results
    }

    /// Number of itineraries found so far.
    pub fn itinerary_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// Take every result found so far, in date order.
    pub fn take_results(&mut self) -> Vec<Itinerary> {
        std::mem::take(&mut self.results)
            .into_values()
            .flatten()
            .collect()
    }

    /// Record a failure that aborted one branch.
    pub fn record_error(&mut self, error: SearchError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[SearchError] {
        &self.errors
    }

    /// Summary of the session so far.
    pub fn summary(&self, itineraries: usize, no_result: Option<String>, from_cache: bool) -> SearchSummary {
        SearchSummary {
            itineraries,
            from_cache,
            rate_limited: self.rate_limited,
            cancelled: self.is_cancelled(),
            no_result,
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Sink that keeps every event.
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<SearchEvent>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<SearchEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn itineraries(&self) -> Vec<Itinerary> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SearchEvent::Itinerary { itinerary } => Some(itinerary),
                    _ => None,
                })
                .collect()
        }

        pub fn progress_messages(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SearchEvent::Progress { message, .. } => Some(message),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: SearchEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// A control reporting into a fresh recording sink.
    pub fn recorded_control() -> (SearchControl, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (SearchControl::new(sink.clone()), sink)
    }
}
