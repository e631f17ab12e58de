//! Background realtime feed polling.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::realtime::FeedSource;

use super::TransitEngine;

/// Poll `source` at the engine's configured realtime poll interval and apply
/// what it returns.
///
/// Failed fetches and undecodable feeds are logged and skipped; the overlay
/// keeps its previous contents. Stale updates are evicted after each poll.
/// Abort the returned handle to stop polling.
pub fn spawn_feed_poller<S: FeedSource>(
    engine: TransitEngine,
    source: S,
) -> JoinHandle<()> {
    // tokio rejects a zero period
    let interval = engine
        .config()
        .realtime
        .poll_interval
        .max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match source.fetch().await {
                Ok(bytes) => match engine.apply_realtime_feed(&bytes).await {
                    Ok(summary) => debug!(
                        applied = summary.applied,
                        discarded = summary.discarded,
                        "Polled realtime feed"
                    ),
                    Err(e) => warn!(error = %e, "Failed to apply realtime feed"),
                },
                Err(e) => warn!(error = %e, "Failed to fetch realtime feed"),
            }

            let evicted = engine.overlay().evict_expired(Utc::now());
            if evicted > 0 {
                debug!(evicted, "Evicted stale realtime updates");
            }
        }
    })
}
