//! Search configuration for the journey planner.

/// Configuration parameters for journey search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum number of transfers when the query sets no bound.
    pub max_transfers: usize,

    /// Minimum time between alighting and boarding another vehicle
    /// (seconds), unless the stop publishes its own.
    pub min_transfer_secs: u32,

    /// Maximum number of itineraries to return.
    pub max_results: usize,

    /// Transfer count at or below which an itinerary may be recommended.
    pub preferred_max_transfers: usize,

    /// How far before an arrive-by deadline to look for departures (seconds).
    pub arrive_by_window_secs: u32,

    /// Maximum number of departure times tried for an arrive-by query.
    pub max_arrive_by_attempts: usize,
}

impl SearchConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(
        max_transfers: usize,
        min_transfer_secs: u32,
        max_results: usize,
        preferred_max_transfers: usize,
        arrive_by_window_secs: u32,
        max_arrive_by_attempts: usize,
    ) -> Self {
        Self {
            max_transfers,
            min_transfer_secs,
            max_results,
            preferred_max_transfers,
            arrive_by_window_secs,
            max_arrive_by_attempts,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_transfers: 3,
            min_transfer_secs: 120,
            max_results: 10,
            preferred_max_transfers: 1,
            arrive_by_window_secs: 3 * 60 * 60,
            max_arrive_by_attempts: 32,
        }
    }
}
