//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the domain layer. They are distinct from API/IO errors.

use super::AirportCode;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// A single leg is malformed
    #[error("invalid leg: {0}")]
    InvalidLeg(&'static str),

    /// Consecutive legs don't share an airport
    #[error("legs do not connect: arrives at {0} but next departs from {1}")]
    LegsNotConnected(AirportCode, AirportCode),

    /// A leg departs before the previous one has landed
    #[error("leg from {0} departs before the previous leg arrives")]
    OverlappingLegs(AirportCode),

    /// Itinerary has no legs
    #[error("itinerary must have at least one leg")]
    EmptyItinerary,

    /// The stored next-leg window contradicts the legs and parameters
    #[error("invalid next-leg window: {0}")]
    InvalidWindow(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::InvalidLeg("arrival precedes departure");
        assert_eq!(err.to_string(), "invalid leg: arrival precedes departure");

        let a = AirportCode::parse("BUD").unwrap();
        let b = AirportCode::parse("WAW").unwrap();
        let err = DomainError::LegsNotConnected(a, b);
        assert_eq!(
            err.to_string(),
            "legs do not connect: arrives at BUD but next departs from WAW"
        );

        let err = DomainError::OverlappingLegs(b);
        assert_eq!(
            err.to_string(),
            "leg from WAW departs before the previous leg arrives"
        );

        let err = DomainError::EmptyItinerary;
        assert_eq!(err.to_string(), "itinerary must have at least one leg");
    }
}
