//! GTFS-Realtime conversion.
//!
//! Turns `TripUpdate` entities into [`RealtimeUpdate`]s for the overlay.
//! Only relative information is used: explicit delays, or an absolute time
//! paired with its scheduled time. Absolute times alone would need the
//! feed's timezone and are skipped.

use chrono::{DateTime, Utc};
use gtfs_realtime::FeedMessage;
use gtfs_realtime::trip_update::{StopTimeEvent, StopTimeUpdate};
use prost::Message;
use tracing::debug;

use crate::domain::{StopId, Trip, TripId};
use crate::network::NetworkModel;

use super::error::RealtimeError;
use super::update::RealtimeUpdate;

/// `TripDescriptor.schedule_relationship` for a cancelled trip.
const TRIP_CANCELED: i32 = 3;

/// `StopTimeUpdate.schedule_relationship` for a skipped stop.
const STOP_SKIPPED: i32 = 1;

/// Decode a protobuf `FeedMessage`.
pub fn decode_feed(bytes: &[u8]) -> Result<FeedMessage, RealtimeError> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Convert the trip updates in a feed to overlay updates.
///
/// Entities for trips not in `model` are ignored. The observation time is
/// the trip update's timestamp, else the feed header's, else `fallback`.
pub fn updates_from_feed(
    feed: &FeedMessage,
    model: &NetworkModel,
    fallback: DateTime<Utc>,
) -> Vec<RealtimeUpdate> {
    let header_time = feed.header.timestamp.and_then(timestamp);
    let mut updates = Vec::new();
    let mut unknown_trips = 0usize;
    let mut skipped_calls = 0usize;

    for entity in &feed.entity {
        if entity.is_deleted == Some(true) {
            continue;
        }
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };
        let Some(trip) = trip_update
            .trip
            .trip_id
            .as_deref()
            .and_then(|id| TripId::parse(id).ok())
            .and_then(|id| model.trip_by_id(&id))
        else {
            unknown_trips += 1;
            continue;
        };

        let observed_at = trip_update
            .timestamp
            .and_then(timestamp)
            .or(header_time)
            .unwrap_or(fallback);

        if trip_update.trip.schedule_relationship == Some(TRIP_CANCELED) {
            updates.extend(
                trip.stops()
                    .map(|stop| RealtimeUpdate::cancellation(trip.id().clone(), stop.clone(), observed_at)),
            );
            continue;
        }

        for stu in &trip_update.stop_time_update {
            match convert_stop_time_update(trip, stu, observed_at) {
                Some(update) => updates.push(update),
                None => skipped_calls += 1,
            }
        }
    }

    debug!(
        updates = updates.len(),
        unknown_trips, skipped_calls, "Converted GTFS-RT feed"
    );
    updates
}

fn convert_stop_time_update(
    trip: &Trip,
    stu: &StopTimeUpdate,
    observed_at: DateTime<Utc>,
) -> Option<RealtimeUpdate> {
    let stop = StopId::parse(stu.stop_id.as_deref()?).ok()?;
    trip.position_of(&stop)?;

    if stu.schedule_relationship == Some(STOP_SKIPPED) {
        return Some(RealtimeUpdate::cancellation(trip.id().clone(), stop, observed_at));
    }

    let arrival = stu.arrival.as_ref().and_then(event_delay);
    let departure = stu.departure.as_ref().and_then(event_delay);
    let (arrival_delay, departure_delay) = match (arrival, departure) {
        (Some(a), Some(d)) => (a, d),
        (Some(x), None) | (None, Some(x)) => (x, x),
        (None, None) => return None,
    };

    Some(RealtimeUpdate::delays(
        trip.id().clone(),
        stop,
        arrival_delay,
        departure_delay,
        observed_at,
    ))
}

fn event_delay(event: &StopTimeEvent) -> Option<i32> {
    if let Some(delay) = event.delay {
        return Some(delay);
    }
    match (event.time, event.scheduled_time) {
        (Some(time), Some(scheduled)) => i32::try_from(time - scheduled).ok(),
        _ => None,
    }
}

fn timestamp(secs: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)
}
