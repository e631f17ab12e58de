//! Serialized schedule snapshots.
//!
//! A `ScheduleSnapshot` is the decoded, not yet validated, form of a static
//! timetable. It is produced from JSON or from a GTFS zip and then handed to
//! [`NetworkModel::load`](super::NetworkModel::load).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Mode, RouteId, ServiceTime, StopId, TripId};

use super::error::FormatError;
use super::gtfs;

/// Encoding of schedule bytes passed to `load_schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFormat {
    /// A JSON-encoded [`ScheduleSnapshot`]
    Json,
    /// A GTFS static feed zip. With a service date, only trips running on
    /// that date (per `calendar.txt` / `calendar_dates.txt`) are kept.
    GtfsZip { service_date: Option<NaiveDate> },
}

/// A static timetable for one service day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    #[serde(default)]
    pub service_date: Option<NaiveDate>,
    pub stops: Vec<StopRecord>,
    #[serde(default)]
    pub routes: Vec<RouteRecord>,
    #[serde(default)]
    pub trips: Vec<TripRecord>,
    #[serde(default)]
    pub transfers: Vec<TransferRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    pub id: StopId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: RouteId,
    #[serde(default)]
    pub name: String,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: TripId,
    pub route: RouteId,
    #[serde(default)]
    pub headsign: Option<String>,
    pub stop_times: Vec<StopTimeRecord>,
}

/// One call of a trip. Either time may be omitted, in which case the
/// other is used for both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTimeRecord {
    pub stop: StopId,
    #[serde(default)]
    pub arrival: Option<ServiceTime>,
    #[serde(default)]
    pub departure: Option<ServiceTime>,
}

/// A published transfer rule between two stops (or at one stop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from: StopId,
    pub to: StopId,
    #[serde(flatten)]
    pub rule: TransferRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferRule {
    /// Changing takes at least this long. With `from == to` this is the
    /// stop's dwell time.
    MinimumTime { min_transfer_secs: u32 },
    /// Changing between these stops is not possible
    NotPossible,
}

impl ScheduleSnapshot {
    /// Decode schedule bytes.
    pub fn from_bytes(bytes: &[u8], format: ScheduleFormat) -> Result<Self, FormatError> {
        match format {
            ScheduleFormat::Json => Ok(serde_json::from_slice(bytes)?),
            ScheduleFormat::GtfsZip { service_date } => gtfs::read_gtfs_zip(bytes, service_date),
        }
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, FormatError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
