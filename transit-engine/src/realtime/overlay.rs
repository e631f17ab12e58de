//! Read-time realtime overlay.
//!
//! The overlay never touches the static schedule. It keeps the latest
//! update per (trip, stop) and composes effective times when asked, so a
//! reader sees either all of an update or none of it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::domain::{ServiceTime, StopId, Trip, TripId};

use super::config::RealtimeConfig;
use super::update::{RealtimeUpdate, StopStatus};

/// Result of applying one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Stored (new, newer, or same-age replacement)
    Applied,
    /// Older than the stored observation for the same call
    Discarded,
}

/// Counts from applying a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub discarded: usize,
}

/// Effective times for one call of a trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveStopTime {
    pub stop: StopId,
    pub scheduled_arrival: ServiceTime,
    pub scheduled_departure: ServiceTime,
    pub arrival: ServiceTime,
    pub departure: ServiceTime,
    pub cancelled: bool,
    /// A fresh update applied to this call
    pub realtime: bool,
}

/// A trip's timetable with realtime applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayView {
    trip: TripId,
    stops: Vec<EffectiveStopTime>,
}

impl DelayView {
    /// The view of a trip with no realtime information.
    pub fn scheduled(trip: &Trip) -> Self {
        Self {
            trip: trip.id().clone(),
            stops: trip
                .stop_times()
                .iter()
                .map(|st| EffectiveStopTime {
                    stop: st.stop.clone(),
                    scheduled_arrival: st.arrival,
                    scheduled_departure: st.departure,
                    arrival: st.arrival,
                    departure: st.departure,
                    cancelled: false,
                    realtime: false,
                })
                .collect(),
        }
    }

    pub fn trip(&self) -> &TripId {
        &self.trip
    }

    /// Effective calls in trip order.
    pub fn stops(&self) -> &[EffectiveStopTime] {
        &self.stops
    }

    /// Returns true if any call has realtime information.
    pub fn is_realtime(&self) -> bool {
        self.stops.iter().any(|s| s.realtime)
    }
}

/// Concurrent store of the latest update per (trip, stop).
///
/// Many readers, one writer at a time. Writers hold the lock for a single
/// map insert.
#[derive(Debug)]
pub struct RealtimeOverlay {
    staleness: chrono::Duration,
    updates: RwLock<HashMap<TripId, HashMap<StopId, RealtimeUpdate>>>,
}

impl RealtimeOverlay {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            staleness: chrono::Duration::from_std(config.staleness)
                .unwrap_or(chrono::Duration::MAX),
            updates: RwLock::new(HashMap::new()),
        }
    }

    /// Store an update unless a strictly newer observation exists for the
    /// same (trip, stop).
    pub fn apply(&self, update: RealtimeUpdate) -> ApplyOutcome {
        let mut guard = self.updates.write().unwrap_or_else(PoisonError::into_inner);
        let per_trip = guard.entry(update.trip.clone()).or_default();

        if let Some(existing) = per_trip.get(&update.stop) {
            if update.observed_at < existing.observed_at {
                trace!(
                    trip = %update.trip,
                    stop = %update.stop,
                    observed_at = %update.observed_at,
                    stored = %existing.observed_at,
                    "Discarded older realtime update"
                );
                return ApplyOutcome::Discarded;
            }
        }

        per_trip.insert(update.stop.clone(), update);
        ApplyOutcome::Applied
    }

    pub fn apply_all(&self, updates: impl IntoIterator<Item = RealtimeUpdate>) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for update in updates {
            match self.apply(update) {
                ApplyOutcome::Applied => summary.applied += 1,
                ApplyOutcome::Discarded => summary.discarded += 1,
            }
        }
        summary
    }

    /// The stored update for a call, stale or not.
    pub fn get(&self, trip: &TripId, stop: &StopId) -> Option<RealtimeUpdate> {
        let guard = self.updates.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(trip).and_then(|m| m.get(stop)).cloned()
    }

    /// Number of stored updates, stale or not.
    pub fn len(&self) -> usize {
        let guard = self.updates.read().unwrap_or_else(PoisonError::into_inner);
        guard.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trips with at least one stored update.
    pub fn updated_trips(&self) -> Vec<TripId> {
        let guard = self.updates.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(trip, _)| trip.clone())
            .collect()
    }

    /// Effective times for `trip` as of now.
    pub fn snapshot_for(&self, trip: &Trip) -> DelayView {
        self.snapshot_at(trip, Utc::now())
    }

    /// Effective times for `trip` as of `now`.
    ///
    /// Calls without a fresh update keep their scheduled times, clamped so
    /// the trip never goes back in time after an earlier delay.
    pub fn snapshot_at(&self, trip: &Trip, now: DateTime<Utc>) -> DelayView {
        let fresh: HashMap<StopId, StopStatus> = {
            let guard = self.updates.read().unwrap_or_else(PoisonError::into_inner);
            match guard.get(trip.id()) {
                Some(per_trip) => per_trip
                    .values()
                    .filter(|u| self.is_fresh(u, now))
                    .map(|u| (u.stop.clone(), u.status))
                    .collect(),
                None => HashMap::new(),
            }
        };

        let mut view = DelayView::scheduled(trip);
        if fresh.is_empty() {
            return view;
        }

        let mut previous_departure = ServiceTime::MIDNIGHT;
        for call in &mut view.stops {
            match fresh.get(&call.stop) {
                Some(StopStatus::Delayed {
                    arrival_delay_secs,
                    departure_delay_secs,
                }) => {
                    call.arrival = call.scheduled_arrival.shifted(*arrival_delay_secs);
                    call.departure = call.scheduled_departure.shifted(*departure_delay_secs);
                    call.realtime = true;
                }
                Some(StopStatus::Cancelled) => {
                    call.cancelled = true;
                    call.realtime = true;
                }
                None => {}
            }

            call.arrival = call.arrival.max(previous_departure);
            call.departure = call.departure.max(call.arrival);
            previous_departure = call.departure;
        }
        view
    }

    /// Drop updates that have gone stale. Returns how many were removed.
    ///
    /// Reads already ignore stale updates; this only bounds memory.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.updates.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        guard.retain(|_, per_trip| {
            let before = per_trip.len();
            per_trip.retain(|_, u| self.is_fresh(u, now));
            removed += before - per_trip.len();
            !per_trip.is_empty()
        });
        removed
    }

    pub fn clear(&self) {
        let mut guard = self.updates.write().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
    }

    fn is_fresh(&self, update: &RealtimeUpdate, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(update.observed_at) <= self.staleness
    }
}
