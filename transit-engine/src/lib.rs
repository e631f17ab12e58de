//! Transit journey-planning engine.
//!
//! Answers "how do I get from here to there" over a static timetable with
//! live delays layered on top. Schedules load as immutable, versioned
//! snapshots; realtime updates sit in a read-time overlay; searches are
//! round-based and return the Pareto set over arrival time and transfers.

pub mod domain;
pub mod engine;
pub mod network;
pub mod planner;
pub mod realtime;
pub mod transfers;
