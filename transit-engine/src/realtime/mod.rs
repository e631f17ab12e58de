//! Realtime overlay.
//!
//! Live delays and cancellations are kept beside the static schedule and
//! applied when a trip's times are read. Stale data silently falls back to
//! the schedule.

mod config;
mod error;
mod feed;
mod overlay;
mod source;
mod update;

pub use config::RealtimeConfig;
pub use error::RealtimeError;
pub use feed::{decode_feed, updates_from_feed};
pub use overlay::{ApplyOutcome, ApplySummary, DelayView, EffectiveStopTime, RealtimeOverlay};
pub use source::{FeedSource, FileFeedSource};
pub use update::{RealtimeUpdate, StopStatus};
