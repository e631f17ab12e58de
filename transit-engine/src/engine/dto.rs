//! Request and response types at the engine boundary.
//!
//! Requests carry loosely-typed stop references; responses carry display
//! names alongside ids so a caller needs no access to the network model.

use serde::{Deserialize, Serialize};

use crate::domain::{Itinerary, Leg, Mode, Ride, ServiceTime, StopId, Transfer, TripId};
use crate::network::NetworkModel;
use crate::planner::TimeReference;

use super::resolver::StopRef;

/// Request to plan a journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyRequest {
    pub origin: StopRef,
    pub destination: StopRef,
    pub time: TimeReference,

    /// Overrides the configured transfer limit
    #[serde(default)]
    pub max_transfers: Option<usize>,
}

impl JourneyRequest {
    pub fn depart_after(origin: StopRef, destination: StopRef, time: ServiceTime) -> Self {
        Self {
            origin,
            destination,
            time: TimeReference::DepartAfter(time),
            max_transfers: None,
        }
    }

    pub fn arrive_by(origin: StopRef, destination: StopRef, time: ServiceTime) -> Self {
        Self {
            origin,
            destination,
            time: TimeReference::ArriveBy(time),
            max_transfers: None,
        }
    }

    pub fn with_max_transfers(mut self, max_transfers: usize) -> Self {
        self.max_transfers = Some(max_transfers);
        self
    }
}

/// Response for journey planning.
#[derive(Debug, Clone, Serialize)]
pub struct ItinerarySetResponse {
    /// Version of the schedule the answer was computed on
    pub snapshot_version: u64,

    /// Pareto-optimal options, best first
    pub itineraries: Vec<ItineraryResult>,

    /// Index into `itineraries` of the suggested option
    pub recommended: Option<usize>,

    /// Search rounds scanned
    pub rounds: usize,
}

/// One journey option.
#[derive(Debug, Clone, Serialize)]
pub struct ItineraryResult {
    pub legs: Vec<LegResult>,
    pub departure_time: ServiceTime,
    pub arrival_time: ServiceTime,
    pub duration_mins: u32,
    pub transfers: usize,
    pub walk_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LegResult {
    Ride(RideResult),
    Transfer(TransferResult),
}

/// A ride on one trip.
#[derive(Debug, Clone, Serialize)]
pub struct RideResult {
    pub trip: TripId,
    pub route: String,
    pub mode: Option<Mode>,
    pub headsign: Option<String>,
    pub board: StopInfo,
    pub alight: StopInfo,

    /// Calls passed without getting off
    pub stops: Vec<StopInfo>,
}

/// A walk between stops.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub from: StopInfo,
    pub to: StopInfo,
    pub duration_secs: u32,
}

/// A stop for display.
#[derive(Debug, Clone, Serialize)]
pub struct StopInfo {
    pub id: StopId,
    pub name: String,

    /// Time at this stop
    pub time: Option<ServiceTime>,
}

/// An upcoming departure from a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextDeparture {
    /// Stop the departure leaves from, one of those the request matched
    pub stop: StopId,
    pub trip: TripId,
    pub route: String,
    pub headsign: Option<String>,
    pub scheduled: ServiceTime,

    /// Departure with realtime applied
    pub expected: ServiceTime,

    /// Seconds behind (positive) or ahead of schedule
    pub delay_secs: i64,
}

impl ItineraryResult {
    /// Create from a domain Itinerary.
    pub fn from_itinerary(itinerary: &Itinerary, model: &NetworkModel) -> Self {
        let legs = itinerary
            .legs()
            .iter()
            .map(|leg| match leg {
                Leg::Ride(ride) => LegResult::Ride(RideResult::from_ride(ride, model)),
                Leg::Transfer(transfer) => {
                    LegResult::Transfer(TransferResult::from_transfer(transfer, model))
                }
            })
            .collect();

        Self {
            legs,
            departure_time: itinerary.departure_time(),
            arrival_time: itinerary.arrival_time(),
            duration_mins: itinerary.duration_secs() / 60,
            transfers: itinerary.transfer_count(),
            walk_secs: itinerary.walk_secs(),
        }
    }
}

impl RideResult {
    pub fn from_ride(ride: &Ride, model: &NetworkModel) -> Self {
        let route = model.route(&ride.route);
        let trip = model.trip_by_id(&ride.trip);

        // Intermediate calls, excluding board and alight
        let stops = trip
            .and_then(|trip| {
                let board = trip.position_of(&ride.board_stop)?;
                let calls = &trip.stop_times()[board..];
                let alight = calls.iter().position(|st| st.stop == ride.alight_stop)?;
                Some(
                    calls[1..alight.max(1)]
                        .iter()
                        .map(|st| stop_info(model, &st.stop, None))
                        .collect(),
                )
            })
            .unwrap_or_default();

        Self {
            trip: ride.trip.clone(),
            route: route
                .map(|r| r.name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| ride.route.to_string()),
            mode: route.map(|r| r.mode),
            headsign: trip.and_then(|t| t.headsign()).map(str::to_string),
            board: stop_info(model, &ride.board_stop, Some(ride.board_time)),
            alight: stop_info(model, &ride.alight_stop, Some(ride.alight_time)),
            stops,
        }
    }
}

impl TransferResult {
    pub fn from_transfer(transfer: &Transfer, model: &NetworkModel) -> Self {
        Self {
            from: stop_info(model, &transfer.from, Some(transfer.departure)),
            to: stop_info(model, &transfer.to, Some(transfer.arrival())),
            duration_secs: transfer.duration_secs,
        }
    }
}

fn stop_info(model: &NetworkModel, id: &StopId, time: Option<ServiceTime>) -> StopInfo {
    StopInfo {
        id: id.clone(),
        name: model
            .stop_by_id(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string()),
        time,
    }
}
