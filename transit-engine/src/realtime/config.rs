//! Realtime configuration.

use std::time::Duration;

/// Settings for the realtime overlay and feed polling.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Updates observed longer ago than this are ignored
    pub staleness: Duration,

    /// How often the feed poller fetches a new snapshot
    pub poll_interval: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(15 * 60),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl RealtimeConfig {
    pub fn new(staleness: Duration, poll_interval: Duration) -> Self {
        Self {
            staleness,
            poll_interval,
        }
    }
}
