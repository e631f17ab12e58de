//! Walking transfers between nearby stops.
//!
//! Some stops are close enough to walk between, enabling connections that
//! don't appear in any timetable. Edges are derived from stop positions and
//! the feed's published transfer rules, then cached per stop.

mod config;
mod index;
mod resolver;

pub use config::TransferConfig;
pub use resolver::{TransferEdge, TransferResolver};
