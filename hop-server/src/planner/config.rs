//! Search configuration for the itinerary planner.

use std::time::Duration;

use rand::Rng;

/// Configuration parameters for itinerary search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Hop budget used when a request doesn't give one.
    pub default_max_hops: u8,

    /// Largest hop budget a request may ask for.
    pub max_hops_limit: u8,

    /// Minimum layover used when a request doesn't give one (hours).
    pub default_min_layover_hours: i64,

    /// Maximum layover used when a request doesn't give one (hours).
    pub default_max_layover_hours: Option<i64>,

    /// How many days past today the pass can be booked.
    /// Layover retries never search beyond this horizon.
    pub future_days: u32,

    /// Delays between carrier queries.
    pub pacing: Pacing,
}

impl SearchConfig {
    /// Set the default hop budget.
    pub fn with_default_max_hops(mut self, hops: u8) -> Self {
        self.default_max_hops = hops;
        self
    }

    /// Set the default minimum layover.
    pub fn with_default_min_layover_hours(mut self, hours: i64) -> Self {
        self.default_min_layover_hours = hours;
        self
    }

    /// Set the default maximum layover.
    pub fn with_default_max_layover_hours(mut self, hours: Option<i64>) -> Self {
        self.default_max_layover_hours = hours;
        self
    }

    /// Set the booking horizon.
    pub fn with_future_days(mut self, days: u32) -> Self {
        self.future_days = days;
        self
    }

    /// Set the pacing.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Clamp a requested hop budget into `1..=max_hops_limit`.
    pub fn hop_budget(&self, requested: Option<u8>) -> u8 {
        requested
            .unwrap_or(self.default_max_hops)
            .clamp(1, self.max_hops_limit.max(1))
    }

    /// Clamp a requested minimum layover to at least one hour.
    pub fn min_layover_hours(&self, requested: Option<i64>) -> i64 {
        requested.unwrap_or(self.default_min_layover_hours).max(1)
    }

    /// Clamp a requested maximum layover to at least one hour.
    pub fn max_layover_hours(&self, requested: Option<i64>) -> Option<i64> {
        requested
            .or(self.default_max_layover_hours)
            .map(|h| h.max(1))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_hops: 3,
            max_hops_limit: 4,
            default_min_layover_hours: 2,
            default_max_layover_hours: None,
            future_days: 3,
            pacing: Pacing::default(),
        }
    }
}

/// Delays that keep the carrier from throttling us.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Lower bound of the random delay before each live query.
    pub jitter_min: Duration,

    /// Upper bound of the random delay before each live query.
    pub jitter_max: Duration,

    /// Pause taken every `cooldown_every` live queries.
    pub cooldown: Duration,

    /// Live queries between cooldowns.
    pub cooldown_every: u32,

    /// Pause after each processed hop.
    pub hop_delay: Duration,

    /// Pause between return dates.
    pub return_date_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            jitter_min: Duration::from_millis(1000),
            jitter_max: Duration::from_millis(1500),
            cooldown: Duration::from_secs(15),
            cooldown_every: 25,
            hop_delay: Duration::from_millis(200),
            return_date_delay: Duration::from_secs(1),
        }
    }
}

impl Pacing {
    /// Pacing with no random jitter but the fixed delays kept.
    ///
    /// Under paused tokio time this makes elapsed time exact.
    pub fn without_jitter() -> Self {
        Self {
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            ..Self::default()
        }
    }

    /// No delays at all.
    pub fn none() -> Self {
        Self {
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            cooldown: Duration::ZERO,
            hop_delay: Duration::ZERO,
            return_date_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Draw a jitter delay uniformly from `[jitter_min, jitter_max]`.
    pub fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Whether a cooldown is due before the next live query.
    pub fn cooldown_due(&self, queries_issued: u32) -> bool {
        self.cooldown_every > 0 && queries_issued > 0 && queries_issued % self.cooldown_every == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SearchConfig::default();

        assert_eq!(config.default_max_hops, 3);
        assert_eq!(config.max_hops_limit, 4);
        assert_eq!(config.default_min_layover_hours, 2);
        assert_eq!(config.future_days, 3);
    }

    #[test]
    fn clamping() {
        let config = SearchConfig::default();

        assert_eq!(config.hop_budget(None), 3);
        assert_eq!(config.hop_budget(Some(0)), 1);
        assert_eq!(config.hop_budget(Some(9)), 4);
        assert_eq!(config.min_layover_hours(None), 2);
        assert_eq!(config.min_layover_hours(Some(0)), 1);
        assert_eq!(config.max_layover_hours(Some(-3)), Some(1));
        assert_eq!(config.max_layover_hours(None), None);

        let config = config.with_default_max_layover_hours(Some(12));
        assert_eq!(config.max_layover_hours(None), Some(12));
        assert_eq!(config.max_layover_hours(Some(6)), Some(6));
    }

    #[test]
    fn jitter_in_range() {
        let pacing = Pacing::default();
        for _ in 0..100 {
            let j = pacing.jitter();
            assert!(j >= Duration::from_millis(1000) && j <= Duration::from_millis(1500));
        }
        assert_eq!(Pacing::none().jitter(), Duration::ZERO);
    }

    #[test]
    fn cooldown_every_25th() {
        let pacing = Pacing::default();
        assert!(!pacing.cooldown_due(0));
        assert!(!pacing.cooldown_due(24));
        assert!(pacing.cooldown_due(25));
        assert!(!pacing.cooldown_due(26));
        assert!(pacing.cooldown_due(50));
    }
}
