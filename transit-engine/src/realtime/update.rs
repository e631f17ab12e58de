//! Realtime update records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{StopId, TripId};

/// What a feed reported for one call of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StopStatus {
    /// Running late (or early, with negative delays)
    Delayed {
        arrival_delay_secs: i32,
        departure_delay_secs: i32,
    },
    /// The trip will not serve this stop
    Cancelled,
}

/// An observed or predicted change to one (trip, stop) call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeUpdate {
    pub trip: TripId,
    pub stop: StopId,
    #[serde(flatten)]
    pub status: StopStatus,
    /// When the feed observed this
    pub observed_at: DateTime<Utc>,
}

impl RealtimeUpdate {
    /// The same delay for arrival and departure.
    pub fn delay(trip: TripId, stop: StopId, delay_secs: i32, observed_at: DateTime<Utc>) -> Self {
        Self::delays(trip, stop, delay_secs, delay_secs, observed_at)
    }

    pub fn delays(
        trip: TripId,
        stop: StopId,
        arrival_delay_secs: i32,
        departure_delay_secs: i32,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trip,
            stop,
            status: StopStatus::Delayed {
                arrival_delay_secs,
                departure_delay_secs,
            },
            observed_at,
        }
    }

    pub fn cancellation(trip: TripId, stop: StopId, observed_at: DateTime<Utc>) -> Self {
        Self {
            trip,
            stop,
            status: StopStatus::Cancelled,
            observed_at,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.status, StopStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let update = RealtimeUpdate::delays(
            TripId::parse("T1").unwrap(),
            StopId::parse("B").unwrap(),
            600,
            540,
            at,
        );
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["trip"], "T1");
        assert_eq!(json["status"], "delayed");
        assert_eq!(json["arrival_delay_secs"], 600);
        assert_eq!(json["departure_delay_secs"], 540);

        let back: RealtimeUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(back, update);
    }

    #[test]
    fn cancellation_from_json() {
        let json = r#"{"trip": "T1", "stop": "B", "status": "cancelled",
                       "observed_at": "2024-03-15T08:00:00Z"}"#;
        let update: RealtimeUpdate = serde_json::from_str(json).unwrap();
        assert!(update.is_cancellation());
    }
}
