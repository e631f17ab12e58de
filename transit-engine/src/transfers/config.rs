//! Transfer resolver configuration.

/// Parameters for walking transfers between stops.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Default search radius around a stop (metres).
    pub walk_radius_m: u32,

    /// Assumed walking speed (metres per second).
    pub walking_speed_mps: f64,

    /// Walks longer than this are not offered (seconds).
    pub max_transfer_secs: u32,

    /// Maximum number of cached per-stop edge lists.
    pub cache_capacity: u64,
}

impl TransferConfig {
    pub fn new(
        walk_radius_m: u32,
        walking_speed_mps: f64,
        max_transfer_secs: u32,
        cache_capacity: u64,
    ) -> Self {
        Self {
            walk_radius_m,
            walking_speed_mps,
            max_transfer_secs,
            cache_capacity,
        }
    }

    /// Estimated walking time for a distance, rounded up to whole seconds.
    pub fn walk_secs(&self, distance_m: f64) -> u32 {
        (distance_m / self.walking_speed_mps).ceil() as u32
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            walk_radius_m: 400,
            walking_speed_mps: 1.3,
            max_transfer_secs: 15 * 60,
            cache_capacity: 10_000,
        }
    }
}
