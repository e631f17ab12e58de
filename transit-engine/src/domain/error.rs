//! Domain error types.
//!
//! These errors represent validation failures in the domain layer. They are
//! distinct from loading and query errors, which wrap them where needed.

use super::{ServiceTime, StopId};

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Latitude/longitude outside the WGS84 range
    #[error("invalid coordinates ({lat}, {lon})")]
    InvalidCoordinates { lat: f64, lon: f64 },

    /// Trip has fewer than two stop times
    #[error("trip must visit at least two stops")]
    TooFewStops,

    /// A stop time departs before it arrives, or before the previous stop
    #[error("times go backwards at stop {stop} (position {position})")]
    NonMonotonicTimes { stop: StopId, position: usize },

    /// Invalid leg construction (e.g., alight before board)
    #[error("invalid leg: {0}")]
    InvalidLeg(&'static str),

    /// Consecutive legs don't share a stop
    #[error("legs do not connect: {0} then {1}")]
    LegsNotConnected(StopId, StopId),

    /// A leg starts before the previous one ends
    #[error("leg from {stop} starts at {start} before previous leg ends at {end}")]
    LegsOverlap {
        stop: StopId,
        start: ServiceTime,
        end: ServiceTime,
    },

    /// Itinerary has no legs
    #[error("itinerary must have at least one leg")]
    EmptyItinerary,
}
