//! Journey planner using round-based search.
//!
//! This module answers "how do I get from here to there, leaving after (or
//! arriving by) this time?" over a loaded network and the live realtime
//! overlay.
//!
//! Each round allows one more ride, so the number of rounds is bounded by
//! the transfer limit. Results are the Pareto set over arrival time and
//! transfer count, so a rider can trade a later arrival for fewer changes.

mod cancel;
mod config;
mod error;
mod query;
mod raptor;
mod rank;
mod search;
mod timetable;

#[cfg(test)]
mod search_tests;

pub use cancel::CancelToken;
pub use config::SearchConfig;
pub use error::SearchError;
pub use query::{Query, TimeReference};
pub use rank::{rank_itineraries, recommend, remove_dominated};
pub use search::{Planner, SearchResult};

pub(crate) use timetable::EffectiveTimes;
