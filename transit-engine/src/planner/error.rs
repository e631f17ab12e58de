//! Journey search errors.

use crate::domain::StopId;

/// Error from journey search.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// The query cannot be answered as asked
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// No itinerary reaches a destination within the transfer bound
    #[error("no route from {} to {} within {max_transfers} transfers", join(.origins), join(.destinations))]
    NoRouteFound {
        origins: Vec<StopId>,
        destinations: Vec<StopId>,
        max_transfers: usize,
    },

    /// The caller abandoned the search
    #[error("search cancelled")]
    Cancelled,
}

fn join(stops: &[StopId]) -> String {
    stops
        .iter()
        .map(StopId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
