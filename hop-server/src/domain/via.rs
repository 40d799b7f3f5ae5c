//! Via constraints: which airports a multi-leg itinerary may connect through.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AirportCode, InvalidAirportCode};

/// Keyword meaning "connect anywhere".
pub const ANY_KEYWORD: &str = "ANY";

/// Restriction on intermediate airports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "airports")]
pub enum Via {
    /// No via list was given.
    #[default]
    Unrestricted,
    /// Only these airports may be used as connection points.
    Airports(BTreeSet<AirportCode>),
    /// Any airport may be used as a connection point.
    Any,
}

impl Via {
    /// Parse a comma separated list such as `"WAW, vie"` or `"ANY"`.
    ///
    /// Empty input means [`Via::Unrestricted`]. `ANY` anywhere in the list
    /// wins over explicit airports.
    pub fn parse_list(s: &str) -> Result<Self, InvalidAirportCode> {
        let mut airports = BTreeSet::new();
        let mut any = false;

        for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if item.eq_ignore_ascii_case(ANY_KEYWORD) {
                any = true;
            } else {
                airports.insert(AirportCode::parse_normalized(item)?);
            }
        }

        Ok(if any {
            Via::Any
        } else if airports.is_empty() {
            Via::Unrestricted
        } else {
            Via::Airports(airports)
        })
    }

    /// Whether a via constraint was given at all (selects the discovery
    /// search strategy).
    pub fn is_constrained(&self) -> bool {
        !matches!(self, Via::Unrestricted)
    }

    /// Whether `airport` may be used as a connection point.
    pub fn permits(&self, airport: &AirportCode) -> bool {
        match self {
            Via::Unrestricted | Via::Any => true,
            Via::Airports(set) => set.contains(airport),
        }
    }

    /// Explicitly listed airports (empty for `Any`/`Unrestricted`).
    pub fn listed(&self) -> impl Iterator<Item = &AirportCode> {
        let set = match self {
            Via::Airports(set) => Some(set),
            _ => None,
        };
        set.into_iter().flatten()
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Via::Unrestricted => Ok(()),
            Via::Any => f.write_str(ANY_KEYWORD),
            Via::Airports(set) => {
                let codes: Vec<&str> = set.iter().map(|c| c.as_str()).collect();
                f.write_str(&codes.join(","))
            }
        }
    }
}
