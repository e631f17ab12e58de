//! Static network model.
//!
//! Schedule bytes (JSON or a GTFS zip) are decoded into a
//! [`ScheduleSnapshot`], validated, and indexed into an immutable
//! [`NetworkModel`] that the search reads.

mod error;
pub(crate) mod gtfs;
mod model;
mod snapshot;

pub use error::{FormatError, ScheduleError, ScheduleIntegrityError};
pub use model::{Departure, NetworkModel, Pattern, PatternIdx, StopIdx, TripIdx};
pub use snapshot::{
    RouteRecord, ScheduleFormat, ScheduleSnapshot, StopRecord, StopTimeRecord, TransferRecord,
    TransferRule, TripRecord,
};

#[cfg(test)]
pub(crate) use model::testing;
