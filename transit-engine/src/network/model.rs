//! The validated, indexed network model.
//!
//! A `NetworkModel` is immutable once built. Everything the search needs is
//! precomputed here: dense indices for stops and trips, trip patterns (trips
//! of one route sharing a stop sequence), per-stop departure lists sorted by
//! time, and the published transfer rules.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::{
    Coordinates, Route, RouteId, ServiceTime, Stop, StopId, StopTime, Trip, TripId,
};

use super::error::{ScheduleError, ScheduleIntegrityError};
use super::snapshot::{ScheduleFormat, ScheduleSnapshot, TransferRule};

/// Dense index of a stop within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopIdx(pub usize);

/// Dense index of a trip within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripIdx(pub usize);

/// Dense index of a trip pattern within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternIdx(pub usize);

/// Trips of one route that visit exactly the same stops in the same order
/// and never overtake one another.
#[derive(Debug, Clone)]
pub struct Pattern {
    route: RouteId,
    stops: Vec<StopIdx>,
    /// Sorted by scheduled first departure, then trip id. Scheduled times at
    /// every position are non-decreasing in this order.
    trips: Vec<TripIdx>,
}

impl Pattern {
    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn stops(&self) -> &[StopIdx] {
        &self.stops
    }

    pub fn trips(&self) -> &[TripIdx] {
        &self.trips
    }
}

/// Give untimed calls a time spread evenly between the timed calls either
/// side of them. Untimed calls before the first or after the last timed
/// call are dropped.
fn fill_untimed(calls: Vec<(StopId, Option<(ServiceTime, ServiceTime)>)>) -> Vec<StopTime> {
    let timed: Vec<(usize, ServiceTime, ServiceTime)> = calls
        .iter()
        .enumerate()
        .filter_map(|(i, (_, times))| times.map(|(arrival, departure)| (i, arrival, departure)))
        .collect();

    let mut filled = Vec::with_capacity(calls.len());
    // First timed call at or after the current one
    let mut next = 0;
    for (i, (stop, times)) in calls.into_iter().enumerate() {
        while next < timed.len() && timed[next].0 < i {
            next += 1;
        }
        let (arrival, departure) = match times {
            Some(times) => times,
            None => {
                let before = next.checked_sub(1).map(|p| timed[p]);
                let (Some((i0, _, from)), Some(&(i1, to, _))) = (before, timed.get(next)) else {
                    continue;
                };
                let span = u64::from(to.as_secs().saturating_sub(from.as_secs()));
                let offset = span * (i - i0) as u64 / (i1 - i0) as u64;
                let time = from.plus_secs(offset as u32);
                (time, time)
            }
        };
        filled.push(StopTime::new(stop, arrival, departure));
    }
    filled
}

/// Returns true if `later` neither arrives nor departs before `earlier` at
/// any call. Both trips must visit the same stops.
fn never_overtakes(earlier: &Trip, later: &Trip) -> bool {
    earlier
        .stop_times()
        .iter()
        .zip(later.stop_times())
        .all(|(a, b)| a.arrival <= b.arrival && a.departure <= b.departure)
}

/// A scheduled departure from a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub time: ServiceTime,
    pub trip: TripIdx,
    /// Position of the call within the trip
    pub position: usize,
}

/// The static network: stops, routes, trips and derived indices.
#[derive(Debug)]
pub struct NetworkModel {
    service_date: Option<NaiveDate>,
    stops: Vec<Stop>,
    stop_index: HashMap<StopId, StopIdx>,
    routes: BTreeMap<RouteId, Route>,
    trips: Vec<Trip>,
    trip_index: HashMap<TripId, TripIdx>,
    trip_pattern: Vec<PatternIdx>,
    patterns: Vec<Pattern>,
    /// Per stop: every (pattern, position) calling there
    patterns_by_stop: Vec<Vec<(PatternIdx, usize)>>,
    /// Per stop: departures sorted by (time, trip id)
    departures: Vec<Vec<Departure>>,
    /// Per stop: rule for changing vehicles at that stop
    stop_rules: Vec<Option<TransferRule>>,
    /// Per stop: rules towards other stops
    transfer_rules: Vec<Vec<(StopIdx, TransferRule)>>,
    service_end: ServiceTime,
}

impl NetworkModel {
    /// Decode and load schedule bytes in one step.
    pub fn from_bytes(bytes: &[u8], format: ScheduleFormat) -> Result<Self, ScheduleError> {
        let snapshot = ScheduleSnapshot::from_bytes(bytes, format)?;
        Ok(Self::load(snapshot)?)
    }

    /// Validate a snapshot and build all indices.
    ///
    /// Loading is all-or-nothing: the first inconsistency aborts it. Calls
    /// with no time are not inconsistent: between timed calls their times
    /// are interpolated, and at either end of a trip they are dropped.
    pub fn load(snapshot: ScheduleSnapshot) -> Result<Self, ScheduleIntegrityError> {
        let mut stops = Vec::with_capacity(snapshot.stops.len());
        let mut stop_index = HashMap::with_capacity(snapshot.stops.len());
        for record in snapshot.stops {
            if stop_index.contains_key(&record.id) {
                return Err(ScheduleIntegrityError::DuplicateStop(record.id));
            }
            let location = Coordinates::new(record.lat, record.lon).map_err(|source| {
                ScheduleIntegrityError::InvalidStop {
                    stop: record.id.clone(),
                    source,
                }
            })?;
            let mut stop = Stop::new(record.id.clone(), record.name, location);
            stop.aliases = record.aliases;
            stop_index.insert(record.id, StopIdx(stops.len()));
            stops.push(stop);
        }

        let mut routes = BTreeMap::new();
        for record in snapshot.routes {
            if routes.contains_key(&record.id) {
                return Err(ScheduleIntegrityError::DuplicateRoute(record.id));
            }
            let route = Route {
                id: record.id.clone(),
                name: record.name,
                mode: record.mode,
            };
            routes.insert(record.id, route);
        }

        let mut trips = Vec::with_capacity(snapshot.trips.len());
        let mut trip_index = HashMap::with_capacity(snapshot.trips.len());
        let mut untimed_ends = 0usize;
        let mut skipped_trips = 0usize;
        for record in snapshot.trips {
            if trip_index.contains_key(&record.id) {
                return Err(ScheduleIntegrityError::DuplicateTrip(record.id));
            }
            if !routes.contains_key(&record.route) {
                return Err(ScheduleIntegrityError::UnknownRoute {
                    trip: record.id,
                    route: record.route,
                });
            }

            let mut calls = Vec::with_capacity(record.stop_times.len());
            for st in record.stop_times {
                if !stop_index.contains_key(&st.stop) {
                    return Err(ScheduleIntegrityError::UnknownStop {
                        trip: record.id,
                        stop: st.stop,
                    });
                }
                let times = match (st.arrival, st.departure) {
                    (Some(a), Some(d)) => Some((a, d)),
                    (Some(t), None) | (None, Some(t)) => Some((t, t)),
                    (None, None) => None,
                };
                calls.push((st.stop, times));
            }
            let total = calls.len();
            let stop_times = fill_untimed(calls);
            if stop_times.len() < total {
                untimed_ends += total - stop_times.len();
                if stop_times.len() < 2 {
                    warn!(trip = %record.id, "Skipped trip with fewer than two timed calls");
                    skipped_trips += 1;
                    continue;
                }
            }

            let trip = Trip::new(record.id.clone(), record.route, record.headsign, stop_times)
                .map_err(|source| ScheduleIntegrityError::InvalidTrip {
                    trip: record.id.clone(),
                    source,
                })?;
            trip_index.insert(record.id, TripIdx(trips.len()));
            trips.push(trip);
        }

        if untimed_ends > 0 {
            warn!(untimed_ends, skipped_trips, "Dropped untimed calls at trip ends");
        }

        let mut stop_rules = vec![None; stops.len()];
        let mut transfer_rules = vec![Vec::new(); stops.len()];
        for record in snapshot.transfers {
            let from = *stop_index
                .get(&record.from)
                .ok_or_else(|| ScheduleIntegrityError::UnknownTransferStop(record.from.clone()))?;
            let to = *stop_index
                .get(&record.to)
                .ok_or_else(|| ScheduleIntegrityError::UnknownTransferStop(record.to.clone()))?;
            // Later records for the same pair win
            if from == to {
                stop_rules[from.0] = Some(record.rule);
            } else if let Some(existing) = transfer_rules[from.0]
                .iter_mut()
                .find(|(stop, _)| *stop == to)
            {
                existing.1 = record.rule;
            } else {
                transfer_rules[from.0].push((to, record.rule));
            }
        }

        let model = Self::index(
            snapshot.service_date,
            stops,
            stop_index,
            routes,
            trips,
            trip_index,
            stop_rules,
            transfer_rules,
        );

        info!(
            stops = model.stops.len(),
            routes = model.routes.len(),
            trips = model.trips.len(),
            patterns = model.patterns.len(),
            service_end = %model.service_end,
            "Loaded network model"
        );
        Ok(model)
    }

    #[allow(clippy::too_many_arguments)]
    fn index(
        service_date: Option<NaiveDate>,
        mut stops: Vec<Stop>,
        stop_index: HashMap<StopId, StopIdx>,
        routes: BTreeMap<RouteId, Route>,
        trips: Vec<Trip>,
        trip_index: HashMap<TripId, TripIdx>,
        stop_rules: Vec<Option<TransferRule>>,
        transfer_rules: Vec<Vec<(StopIdx, TransferRule)>>,
    ) -> Self {
        // Ids were checked against the index while loading
        let idx_of = |stop: &StopId| stop_index[stop];

        let mut group_of: HashMap<(RouteId, Vec<StopIdx>), usize> = HashMap::new();
        let mut groups: Vec<((RouteId, Vec<StopIdx>), Vec<TripIdx>)> = Vec::new();
        let mut departures = vec![Vec::new(); stops.len()];

        for (i, trip) in trips.iter().enumerate() {
            let sequence: Vec<StopIdx> = trip.stops().map(idx_of).collect();

            for stop in &sequence {
                stops[stop.0].routes.insert(trip.route().clone());
            }

            let last = trip.stop_times().len() - 1;
            for (position, st) in trip.stop_times().iter().enumerate().take(last) {
                departures[idx_of(&st.stop).0].push(Departure {
                    time: st.departure,
                    trip: TripIdx(i),
                    position,
                });
            }

            let key = (trip.route().clone(), sequence);
            let group = *group_of.entry(key.clone()).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[group].1.push(TripIdx(i));
        }

        // Trips that overtake one another go to separate patterns, so within
        // a pattern every call time is non-decreasing in trip order.
        let mut patterns: Vec<Pattern> = Vec::new();
        let mut trip_pattern = vec![PatternIdx(0); trips.len()];
        for ((route, sequence), mut members) in groups {
            members.sort_by(|a, b| {
                let (ta, tb) = (&trips[a.0], &trips[b.0]);
                (ta.first_departure(), ta.id()).cmp(&(tb.first_departure(), tb.id()))
            });
            let first = patterns.len();
            for trip in members {
                let fits = patterns[first..].iter().position(|p| {
                    p.trips
                        .last()
                        .is_none_or(|&prev| never_overtakes(&trips[prev.0], &trips[trip.0]))
                });
                let pattern = match fits {
                    Some(offset) => first + offset,
                    None => {
                        patterns.push(Pattern {
                            route: route.clone(),
                            stops: sequence.clone(),
                            trips: Vec::new(),
                        });
                        patterns.len() - 1
                    }
                };
                patterns[pattern].trips.push(trip);
                trip_pattern[trip.0] = PatternIdx(pattern);
            }
        }

        for list in &mut departures {
            list.sort_by(|a, b| {
                (a.time, trips[a.trip.0].id()).cmp(&(b.time, trips[b.trip.0].id()))
            });
        }

        let mut patterns_by_stop = vec![Vec::new(); stops.len()];
        for (p, pattern) in patterns.iter().enumerate() {
            for (position, stop) in pattern.stops.iter().enumerate() {
                patterns_by_stop[stop.0].push((PatternIdx(p), position));
            }
        }

        let latest = trips
            .iter()
            .map(Trip::last_arrival)
            .max()
            .unwrap_or(ServiceTime::MIDNIGHT);
        let service_end = latest.max(ServiceTime::from_hms(23, 59, 59));

        Self {
            service_date,
            stops,
            stop_index,
            routes,
            trips,
            trip_index,
            trip_pattern,
            patterns,
            patterns_by_stop,
            departures,
            stop_rules,
            transfer_rules,
            service_end,
        }
    }

    /// The calendar date this timetable is for, if known.
    pub fn service_date(&self) -> Option<NaiveDate> {
        self.service_date
    }

    /// Latest valid query time: 23:59:59 or the last scheduled arrival,
    /// whichever is later.
    pub fn service_end(&self) -> ServiceTime {
        self.service_end
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop(&self, idx: StopIdx) -> &Stop {
        &self.stops[idx.0]
    }

    pub fn stop_idx(&self, id: &StopId) -> Option<StopIdx> {
        self.stop_index.get(id).copied()
    }

    pub fn stop_by_id(&self, id: &StopId) -> Option<&Stop> {
        self.stop_idx(id).map(|idx| self.stop(idx))
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Routes with at least one trip calling at `stop`.
    pub fn routes_at(&self, stop: &StopId) -> Option<&BTreeSet<RouteId>> {
        self.stop_by_id(stop).map(|s| &s.routes)
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn trip(&self, idx: TripIdx) -> &Trip {
        &self.trips[idx.0]
    }

    pub fn trip_idx(&self, id: &TripId) -> Option<TripIdx> {
        self.trip_index.get(id).copied()
    }

    pub fn trip_by_id(&self, id: &TripId) -> Option<&Trip> {
        self.trip_idx(id).map(|idx| self.trip(idx))
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, idx: PatternIdx) -> &Pattern {
        &self.patterns[idx.0]
    }

    pub fn pattern_of(&self, trip: TripIdx) -> PatternIdx {
        self.trip_pattern[trip.0]
    }

    /// Every (pattern, position) pair calling at `stop`.
    pub fn patterns_at(&self, stop: StopIdx) -> &[(PatternIdx, usize)] {
        &self.patterns_by_stop[stop.0]
    }

    /// All scheduled departures from `stop`, sorted by time then trip id.
    pub fn departures_at(&self, stop: StopIdx) -> &[Departure] {
        &self.departures[stop.0]
    }

    /// Scheduled departures from `stop` at or after `time`.
    pub fn departures_after(&self, stop: StopIdx, time: ServiceTime) -> &[Departure] {
        let all = self.departures_at(stop);
        let start = all.partition_point(|d| d.time < time);
        &all[start..]
    }

    /// Published rule for changing vehicles at `stop`.
    pub fn stop_rule(&self, stop: StopIdx) -> Option<TransferRule> {
        self.stop_rules[stop.0]
    }

    /// Published rules from `stop` to other stops.
    pub fn transfer_rules_from(&self, stop: StopIdx) -> &[(StopIdx, TransferRule)] {
        &self.transfer_rules[stop.0]
    }

    /// Published rule between two different stops.
    pub fn transfer_rule(&self, from: StopIdx, to: StopIdx) -> Option<TransferRule> {
        self.transfer_rules[from.0]
            .iter()
            .find(|(stop, _)| *stop == to)
            .map(|(_, rule)| *rule)
    }
}
