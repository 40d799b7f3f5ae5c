//! Flight availability with caching and pacing.
//!
//! Every live query is preceded by a random jitter, and every 25th one by
//! a longer cooldown, so a search never looks like a burst to the carrier.

use chrono::NaiveDate;
use tracing::{debug, info, trace, warn};

use crate::cache::{CacheKey, TtlCache};
use crate::carrier::CarrierError;
use crate::domain::{AirportCode, FlightLeg};

use super::config::Pacing;
use super::control::SearchControl;
use super::error::SearchError;
use super::provider::AvailabilitySource;

/// Cached, paced availability queries.
pub struct AvailabilityClient<A> {
    source: A,
    cache: TtlCache,
    pacing: Pacing,
}

impl<A: AvailabilitySource> AvailabilityClient<A> {
    pub fn new(source: A, cache: TtlCache, pacing: Pacing) -> Self {
        Self {
            source,
            cache,
            pacing,
        }
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Flights from `origin` to `destination` on `date`.
    ///
    /// Cached results are used unless the search forces a refresh; even
    /// then, results written after the search started are reused. "Not
    /// available" answers are cached as an empty list.
    pub async fn query(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
        control: &mut SearchControl,
    ) -> Result<Vec<FlightLeg>, SearchError> {
        let key = CacheKey::Flights {
            origin: *origin,
            destination: *destination,
            date,
        };

        if let Some((legs, stored_at)) = self.cache.get_value::<Vec<FlightLeg>>(&key)
            && (!control.force_refresh() || stored_at >= control.started_at())
        {
            trace!(%origin, %destination, %date, "Using cached flights");
            return Ok(legs);
        }

        if control.is_rate_limited() {
            return Err(SearchError::RateLimited);
        }

        if self.pacing.cooldown_due(control.queries_issued()) {
            control.progress(format!(
                "Taking a {} second break to avoid rate limiting...",
                self.pacing.cooldown.as_secs()
            ));
            info!(queries = control.queries_issued(), "Cooling down");
            tokio::time::sleep(self.pacing.cooldown).await;
        }

        control.note_query();
        tokio::time::sleep(self.pacing.jitter()).await;

        debug!(%origin, %destination, %date, "Querying availability");
        match self.source.fetch_availability(origin, destination, date).await {
            Ok(legs) => {
                self.store(&key, &legs);
                Ok(legs)
            }
            Err(CarrierError::NotAvailable { .. }) => {
                self.store(&key, &[]);
                Ok(Vec::new())
            }
            Err(CarrierError::SessionUnavailable(message)) => {
                Err(SearchError::SessionUnavailable(message))
            }
            Err(e) if e.is_rate_limit() => {
                warn!(%origin, %destination, %date, error = %e, "Rate limited");
                control.mark_rate_limited();
                Err(SearchError::RateLimited)
            }
            Err(e) => Err(SearchError::Availability {
                origin: *origin,
                destination: *destination,
                date,
                message: e.to_string(),
            }),
        }
    }

    fn store(&self, key: &CacheKey, legs: &[FlightLeg]) {
        if let Err(e) = self.cache.set(key, &legs) {
            warn!(key = %key, error = %e, "Failed to cache flights");
        }
    }
}
