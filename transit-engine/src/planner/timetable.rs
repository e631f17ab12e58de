//! Effective trip times as seen by one search.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::ServiceTime;
use crate::network::{NetworkModel, PatternIdx, TripIdx};
use crate::realtime::{DelayView, RealtimeOverlay};

/// Effective times of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallTimes {
    pub(crate) arrival: ServiceTime,
    pub(crate) departure: ServiceTime,
    pub(crate) cancelled: bool,
}

/// Realtime views captured once so a whole search reads a consistent state.
///
/// Trips without fresh updates are read straight from the schedule.
#[derive(Debug, Clone, Default)]
pub(crate) struct EffectiveTimes {
    views: HashMap<TripIdx, DelayView>,
    /// Realtime trips of each pattern, in pattern order
    by_pattern: HashMap<PatternIdx, Vec<TripIdx>>,
}

impl EffectiveTimes {
    /// Scheduled times only.
    pub(crate) fn scheduled() -> Self {
        Self::default()
    }

    /// Capture every trip with fresh realtime data as of `now`.
    pub(crate) fn capture(
        model: &NetworkModel,
        overlay: &RealtimeOverlay,
        now: DateTime<Utc>,
    ) -> Self {
        let views: HashMap<TripIdx, DelayView> = overlay
            .updated_trips()
            .iter()
            .filter_map(|id| model.trip_idx(id))
            .filter_map(|idx| {
                let view = overlay.snapshot_at(model.trip(idx), now);
                view.is_realtime().then_some((idx, view))
            })
            .collect();

        let mut by_pattern: HashMap<PatternIdx, Vec<TripIdx>> = HashMap::new();
        for &trip in views.keys() {
            by_pattern.entry(model.pattern_of(trip)).or_default().push(trip);
        }
        for (pattern, trips) in &mut by_pattern {
            let order = model.pattern(*pattern).trips();
            trips.sort_by_key(|t| order.iter().position(|o| o == t));
        }
        Self { views, by_pattern }
    }

    pub(crate) fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true if `trip` has fresh realtime data.
    pub(crate) fn is_realtime(&self, trip: TripIdx) -> bool {
        self.views.contains_key(&trip)
    }

    /// Trips with fresh realtime data.
    pub(crate) fn realtime_trips(&self) -> impl Iterator<Item = TripIdx> + '_ {
        self.views.keys().copied()
    }

    /// Trips of `pattern` with fresh realtime data, in pattern order.
    pub(crate) fn realtime_in(&self, pattern: PatternIdx) -> &[TripIdx] {
        self.by_pattern.get(&pattern).map_or(&[], Vec::as_slice)
    }

    /// Times of the call at `position` on `trip`.
    pub(crate) fn call(&self, model: &NetworkModel, trip: TripIdx, position: usize) -> CallTimes {
        if let Some(call) = self.views.get(&trip).and_then(|v| v.stops().get(position)) {
            return CallTimes {
                arrival: call.arrival,
                departure: call.departure,
                cancelled: call.cancelled,
            };
        }
        let st = &model.trip(trip).stop_times()[position];
        CallTimes {
            arrival: st.arrival,
            departure: st.departure,
            cancelled: false,
        }
    }
}
