//! Cache keys and namespaces.

use std::fmt;

use chrono::NaiveDate;

use crate::domain::{AirportCode, Via};

/// Prefix for short-lived page data (route map, session).
pub const PAGE_PREFIX: &str = "page:";
/// Prefix for per-route availability results.
pub const FLIGHTS_PREFIX: &str = "flights:";
/// Prefix for whole-search itinerary records.
pub const ITINERARY_PREFIX: &str = "itinerary:";

/// Placeholder for an absent arrival or via list in itinerary keys.
const EMPTY_SLOT: &str = "_";

/// Which TTL a key falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Page,
    Flights,
    Itinerary,
}

impl Namespace {
    /// Classify a raw key by its prefix.
    pub fn of(key: &str) -> Option<Self> {
        if key.starts_with(PAGE_PREFIX) {
            Some(Namespace::Page)
        } else if key.starts_with(FLIGHTS_PREFIX) {
            Some(Namespace::Flights)
        } else if key.starts_with(ITINERARY_PREFIX) {
            Some(Namespace::Itinerary)
        } else {
            None
        }
    }
}

/// A typed cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// The whole route map.
    RouteMap,
    /// The carrier session context.
    Session,
    /// Flights for one route on one date.
    Flights {
        origin: AirportCode,
        destination: AirportCode,
        date: NaiveDate,
    },
    /// The result of a whole one-way search.
    Itinerary(SearchKey),
}

impl CacheKey {
    /// The namespace this key lives in.
    pub fn namespace(&self) -> Namespace {
        match self {
            CacheKey::RouteMap | CacheKey::Session => Namespace::Page,
            CacheKey::Flights { .. } => Namespace::Flights,
            CacheKey::Itinerary(_) => Namespace::Itinerary,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::RouteMap => write!(f, "{PAGE_PREFIX}routes"),
            CacheKey::Session => write!(f, "{PAGE_PREFIX}session"),
            CacheKey::Flights {
                origin,
                destination,
                date,
            } => write!(f, "{FLIGHTS_PREFIX}{origin}-{destination}-{date}"),
            CacheKey::Itinerary(search) => write!(f, "{ITINERARY_PREFIX}{search}"),
        }
    }
}

/// Identity of a one-way search: `{origin}-{arrival|_}-{via|_}-{date}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey {
    pub origin: AirportCode,
    pub arrival: Option<AirportCode>,
    pub via: Via,
    pub date: NaiveDate,
}

impl SearchKey {
    /// Parse a full `itinerary:` key back into its parts.
    ///
    /// Returns `None` for keys in other namespaces or malformed keys.
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(ITINERARY_PREFIX)?;
        let mut parts = rest.splitn(4, '-');
        let origin = AirportCode::parse(parts.next()?).ok()?;
        let arrival = match parts.next()? {
            EMPTY_SLOT => None,
            s => Some(AirportCode::parse(s).ok()?),
        };
        let via = match parts.next()? {
            EMPTY_SLOT => Via::Unrestricted,
            s => Via::parse_list(s).ok()?,
        };
        let date = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;

        Some(Self {
            origin,
            arrival,
            via,
            date,
        })
    }

    /// The full cache key.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::Itinerary(self.clone())
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-", self.origin)?;
        match &self.arrival {
            Some(a) => write!(f, "{a}-")?,
            None => write!(f, "{EMPTY_SLOT}-")?,
        }
        if self.via.is_constrained() {
            write!(f, "{}-", self.via)?;
        } else {
            write!(f, "{EMPTY_SLOT}-")?;
        }
        write!(f, "{}", self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> AirportCode {
        AirportCode::parse(s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[test]
    fn key_strings() {
        assert_eq!(CacheKey::RouteMap.to_string(), "page:routes");
        assert_eq!(CacheKey::Session.to_string(), "page:session");

        let flights = CacheKey::Flights {
            origin: code("BUD"),
            destination: code("LTN"),
            date: date(),
        };
        assert_eq!(flights.to_string(), "flights:BUD-LTN-2025-03-01");
        assert_eq!(flights.namespace(), Namespace::Flights);
    }

    #[test]
    fn search_key_roundtrip() {
        let key = SearchKey {
            origin: code("BUD"),
            arrival: Some(code("LTN")),
            via: Via::parse_list("WAW,VIE").unwrap(),
            date: date(),
        };
        let s = key.cache_key().to_string();
        assert_eq!(s, "itinerary:BUD-LTN-VIE,WAW-2025-03-01");
        assert_eq!(SearchKey::parse(&s), Some(key));
    }

    #[test]
    fn search_key_empty_slots() {
        let key = SearchKey {
            origin: code("BUD"),
            arrival: None,
            via: Via::Unrestricted,
            date: date(),
        };
        let s = key.cache_key().to_string();
        assert_eq!(s, "itinerary:BUD-_-_-2025-03-01");
        assert_eq!(SearchKey::parse(&s), Some(key));
    }

    #[test]
    fn search_key_rejects_other_namespaces() {
        assert!(SearchKey::parse("flights:BUD-LTN-2025-03-01").is_none());
        assert!(SearchKey::parse("itinerary:BUD-LTN").is_none());
    }

    #[test]
    fn namespace_of_raw_keys() {
        assert_eq!(Namespace::of("page:routes"), Some(Namespace::Page));
        assert_eq!(
            Namespace::of("itinerary:BUD-_-_-2025-03-01"),
            Some(Namespace::Itinerary)
        );
        assert_eq!(Namespace::of("other"), None);
    }
}
