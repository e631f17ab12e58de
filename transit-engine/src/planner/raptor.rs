//! Round-based search over trip patterns.
//!
//! Round `r` holds the earliest known arrivals that use exactly `r` rides.
//! Each round scans every pattern serving a stop improved in the previous
//! round, then relaxes walking transfers from stops the scan improved. Only
//! strict improvements over all earlier rounds are recorded, so the labels
//! reaching a destination form a Pareto set over (arrival, rides).

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace, warn};

use crate::domain::{Itinerary, Leg, Ride, ServiceTime, Transfer, TripId};
use crate::network::{NetworkModel, PatternIdx, StopIdx, TransferRule, TripIdx};
use crate::transfers::{TransferEdge, TransferResolver};

use super::cancel::CancelToken;
use super::config::SearchConfig;
use super::error::SearchError;
use super::timetable::EffectiveTimes;

/// Arrival at a stop by riding a trip.
#[derive(Debug, Clone, Copy)]
struct RideLabel {
    arrival: ServiceTime,
    trip: TripIdx,
    board_stop: StopIdx,
    board_pos: usize,
    alight_pos: usize,
}

/// Arrival at a stop by walking from another.
#[derive(Debug, Clone, Copy)]
struct WalkLabel {
    arrival: ServiceTime,
    from: StopIdx,
    departure: ServiceTime,
    duration_secs: u32,
}

/// How a rider came to be ready to board at a stop.
///
/// Declaration order is the tie-break between equal ready times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Via {
    Origin,
    Ride,
    Walk,
}

/// Labels of one round.
struct Round {
    ride: Vec<Option<RideLabel>>,
    walk: Vec<Option<WalkLabel>>,
}

impl Round {
    fn new(stops: usize) -> Self {
        Self {
            ride: vec![None; stops],
            walk: vec![None; stops],
        }
    }
}

/// Per-search state; nothing here outlives one run.
struct Labels {
    /// Departure time at each origin (round 0 only)
    origin: Vec<Option<ServiceTime>>,
    rounds: Vec<Round>,
    /// Earliest arrival at each stop over all rounds so far
    best_arrival: Vec<ServiceTime>,
    /// Earliest time each stop could be left on a vehicle
    best_ready: Vec<ServiceTime>,
}

impl Labels {
    fn new(stops: usize) -> Self {
        Self {
            origin: vec![None; stops],
            rounds: vec![Round::new(stops)],
            best_arrival: vec![ServiceTime::NEVER; stops],
            best_ready: vec![ServiceTime::NEVER; stops],
        }
    }

    /// Earliest arrival at any of `stops`.
    fn bound(&self, stops: &[StopIdx]) -> ServiceTime {
        stops
            .iter()
            .map(|s| self.best_arrival[s.0])
            .min()
            .unwrap_or(ServiceTime::NEVER)
    }
}

/// Where a trip carried along a pattern scan was boarded.
#[derive(Debug, Clone, Copy)]
struct Boarding {
    trip: TripIdx,
    stop: StopIdx,
    position: usize,
}

/// Trips carried along one pattern scan.
///
/// Scheduled trips of a pattern never overtake, so only the earliest one
/// boardable so far is kept. Trips with realtime data may overtake or skip
/// calls, so each is kept from the first stop it could be boarded at.
#[derive(Debug, Default)]
struct Carried {
    /// Order within the pattern and boarding of the scheduled trip
    scheduled: Option<(usize, Boarding)>,
    realtime: Vec<Boarding>,
}

/// Output of one depart-after run.
#[derive(Debug)]
pub(crate) struct RaptorOutput {
    /// One itinerary per round that improved the best destination arrival
    pub(crate) itineraries: Vec<Itinerary>,
    pub(crate) rounds: usize,
}

/// One round-based search over a fixed model and realtime view.
pub(crate) struct Raptor<'a> {
    model: &'a NetworkModel,
    transfers: &'a TransferResolver,
    config: &'a SearchConfig,
    times: &'a EffectiveTimes,
}

impl<'a> Raptor<'a> {
    pub(crate) fn new(
        model: &'a NetworkModel,
        transfers: &'a TransferResolver,
        config: &'a SearchConfig,
        times: &'a EffectiveTimes,
    ) -> Self {
        Self {
            model,
            transfers,
            config,
            times,
        }
    }

    /// Find itineraries leaving any origin at or after `departure`, using at
    /// most `max_rides` rides.
    pub(crate) fn run(
        &self,
        origins: &[StopIdx],
        destinations: &[StopIdx],
        departure: ServiceTime,
        max_rides: usize,
        cancel: &CancelToken,
    ) -> Result<RaptorOutput, SearchError> {
        let mut labels = Labels::new(self.model.stops().len());
        let mut marked = BTreeSet::new();

        for &origin in origins {
            labels.origin[origin.0] = Some(departure);
            labels.best_arrival[origin.0] = departure;
            labels.best_ready[origin.0] = departure;
            marked.insert(origin);
        }

        // Walking from an origin needs no change of vehicle.
        for &origin in origins {
            for edge in self.transfers.edges_from(origin).iter() {
                let walk = WalkLabel {
                    arrival: departure.plus_secs(edge.duration_secs),
                    from: origin,
                    departure,
                    duration_secs: edge.duration_secs,
                };
                if self.relax_walk(&mut labels, 0, edge.to_idx, walk, destinations) {
                    marked.insert(edge.to_idx);
                }
            }
        }

        let mut itineraries = Vec::new();
        self.collect(&labels, 0, destinations, &mut itineraries);

        let mut rounds = 0;
        for round in 1..=max_rides {
            if cancel.is_cancelled() {
                debug!(round, "Search cancelled");
                return Err(SearchError::Cancelled);
            }
            if marked.is_empty() {
                break;
            }
            rounds = round;
            labels.rounds.push(Round::new(self.model.stops().len()));

            let queue = self.queue_patterns(&marked);
            let mut improved = BTreeSet::new();
            for (&pattern, &start) in &queue {
                self.scan_pattern(&mut labels, round, pattern, start, destinations, &mut improved);
            }

            let mut next = improved.clone();
            for &from in &improved {
                self.relax_transfers(&mut labels, round, from, destinations, &mut next);
            }

            debug!(
                round,
                patterns = queue.len(),
                rides = improved.len(),
                marked = next.len(),
                "Finished round"
            );
            self.collect(&labels, round, destinations, &mut itineraries);
            marked = next;
        }

        Ok(RaptorOutput { itineraries, rounds })
    }

    /// Minimum change time at a stop, or `None` if changing there is not
    /// possible.
    fn dwell(&self, stop: StopIdx) -> Option<u32> {
        match self.model.stop_rule(stop) {
            Some(TransferRule::MinimumTime { min_transfer_secs }) => Some(min_transfer_secs),
            Some(TransferRule::NotPossible) => None,
            None => Some(self.config.min_transfer_secs),
        }
    }

    /// Walk time after alighting. Published pair rules are taken as given.
    fn walk_after_ride(&self, from: StopIdx, edge: &TransferEdge) -> u32 {
        match self.model.transfer_rule(from, edge.to_idx) {
            Some(TransferRule::MinimumTime { .. }) => edge.duration_secs,
            _ => edge.duration_secs.max(self.config.min_transfer_secs),
        }
    }

    /// When a rider could next board at `stop` using round `round` labels.
    fn ready(&self, labels: &Labels, round: usize, stop: StopIdx) -> Option<(ServiceTime, Via)> {
        let mut best: Option<(ServiceTime, Via)> = None;
        let mut consider = |time: ServiceTime, via: Via| {
            if best.is_none_or(|(t, _)| time < t) {
                best = Some((time, via));
            }
        };

        if round == 0 {
            if let Some(time) = labels.origin[stop.0] {
                consider(time, Via::Origin);
            }
        }
        let labels = &labels.rounds[round];
        if let Some(ride) = labels.ride[stop.0] {
            if let Some(dwell) = self.dwell(stop) {
                consider(ride.arrival.plus_secs(dwell), Via::Ride);
            }
        }
        if let Some(walk) = labels.walk[stop.0] {
            consider(walk.arrival, Via::Walk);
        }
        best
    }

    /// Earliest position at which each pattern serves a marked stop.
    fn queue_patterns(&self, marked: &BTreeSet<StopIdx>) -> BTreeMap<PatternIdx, usize> {
        let mut queue = BTreeMap::new();
        for &stop in marked {
            for &(pattern, position) in self.model.patterns_at(stop) {
                queue
                    .entry(pattern)
                    .and_modify(|p: &mut usize| *p = (*p).min(position))
                    .or_insert(position);
            }
        }
        queue
    }

    fn scan_pattern(
        &self,
        labels: &mut Labels,
        round: usize,
        pattern_idx: PatternIdx,
        start: usize,
        destinations: &[StopIdx],
        improved: &mut BTreeSet<StopIdx>,
    ) {
        let pattern = self.model.pattern(pattern_idx);
        let realtime = self.times.realtime_in(pattern_idx);
        let last = pattern.stops().len().saturating_sub(1);
        let mut carried = Carried::default();

        for (position, &stop) in pattern.stops().iter().enumerate().skip(start) {
            if let Some((arrival, boarding)) = self.best_alighting(&carried, position) {
                let bound = labels.bound(destinations);
                if arrival < labels.best_arrival[stop.0] && arrival < bound {
                    labels.rounds[round].ride[stop.0] = Some(RideLabel {
                        arrival,
                        trip: boarding.trip,
                        board_stop: boarding.stop,
                        board_pos: boarding.position,
                        alight_pos: position,
                    });
                    labels.best_arrival[stop.0] = arrival;
                    if let Some(dwell) = self.dwell(stop) {
                        let ready = arrival.plus_secs(dwell);
                        labels.best_ready[stop.0] = labels.best_ready[stop.0].min(ready);
                    }
                    improved.insert(stop);
                }
            }

            if position == last {
                break;
            }
            let Some((ready, _)) = self.ready(labels, round - 1, stop) else {
                continue;
            };
            let boarding = |trip| Boarding {
                trip,
                stop,
                position,
            };
            if let Some(order) = self.first_scheduled(pattern.trips(), position, ready) {
                if carried.scheduled.is_none_or(|(held, _)| order < held) {
                    carried.scheduled = Some((order, boarding(pattern.trips()[order])));
                }
            }
            for &trip in realtime {
                if carried.realtime.iter().any(|b| b.trip == trip) {
                    continue;
                }
                let call = self.times.call(self.model, trip, position);
                if !call.cancelled && call.departure >= ready {
                    carried.realtime.push(boarding(trip));
                }
            }
        }
    }

    /// Order within `trips` of the first trip without realtime data leaving
    /// `position` at or after `ready`.
    fn first_scheduled(
        &self,
        trips: &[TripIdx],
        position: usize,
        ready: ServiceTime,
    ) -> Option<usize> {
        let start = trips.partition_point(|&trip| {
            self.model.trip(trip).stop_times()[position].departure < ready
        });
        (start..trips.len()).find(|&order| !self.times.is_realtime(trips[order]))
    }

    /// The carried trip reaching `position` first, ties broken by trip id.
    fn best_alighting(&self, carried: &Carried, position: usize) -> Option<(ServiceTime, Boarding)> {
        carried
            .scheduled
            .map(|(_, boarding)| boarding)
            .into_iter()
            .chain(carried.realtime.iter().copied())
            .filter_map(|boarding| {
                let call = self.times.call(self.model, boarding.trip, position);
                (!call.cancelled).then_some((call.arrival, boarding))
            })
            .min_by(|a, b| {
                a.0.cmp(&b.0)
                    .then_with(|| self.trip_id(a.1.trip).cmp(self.trip_id(b.1.trip)))
            })
    }

    fn relax_transfers(
        &self,
        labels: &mut Labels,
        round: usize,
        from: StopIdx,
        destinations: &[StopIdx],
        marked: &mut BTreeSet<StopIdx>,
    ) {
        let Some(ride) = labels.rounds[round].ride[from.0] else {
            return;
        };
        for edge in self.transfers.edges_from(from).iter() {
            let duration_secs = self.walk_after_ride(from, edge);
            let walk = WalkLabel {
                arrival: ride.arrival.plus_secs(duration_secs),
                from,
                departure: ride.arrival,
                duration_secs,
            };
            if self.relax_walk(labels, round, edge.to_idx, walk, destinations) {
                marked.insert(edge.to_idx);
            }
        }
    }

    fn relax_walk(
        &self,
        labels: &mut Labels,
        round: usize,
        to: StopIdx,
        walk: WalkLabel,
        destinations: &[StopIdx],
    ) -> bool {
        if walk.arrival >= labels.best_ready[to.0] || walk.arrival >= labels.bound(destinations) {
            return false;
        }
        trace!(round, from = walk.from.0, to = to.0, arrival = %walk.arrival, "Walk improved stop");
        labels.rounds[round].walk[to.0] = Some(walk);
        labels.best_ready[to.0] = walk.arrival;
        labels.best_arrival[to.0] = labels.best_arrival[to.0].min(walk.arrival);
        true
    }

    /// Record the best destination reached in `round`, if any.
    fn collect(
        &self,
        labels: &Labels,
        round: usize,
        destinations: &[StopIdx],
        out: &mut Vec<Itinerary>,
    ) {
        let found = destinations
            .iter()
            .flat_map(|&stop| {
                let labels = &labels.rounds[round];
                let ride = labels.ride[stop.0].map(|l| (l.arrival, Via::Ride, stop));
                let walk = labels.walk[stop.0].map(|l| (l.arrival, Via::Walk, stop));
                ride.into_iter().chain(walk)
            })
            .min_by(|a, b| {
                a.0.cmp(&b.0)
                    .then_with(|| self.model.stop(a.2).id.cmp(&self.model.stop(b.2).id))
            });

        if let Some((arrival, via, stop)) = found {
            trace!(round, stop = %self.model.stop(stop).id, %arrival, "Destination reached");
            if let Some(itinerary) = self.reconstruct(labels, round, stop, via) {
                out.push(itinerary);
            }
        }
    }

    /// Walk the labels back from a destination to an origin.
    fn reconstruct(
        &self,
        labels: &Labels,
        mut round: usize,
        mut stop: StopIdx,
        mut via: Via,
    ) -> Option<Itinerary> {
        let mut legs = Vec::new();
        loop {
            match via {
                Via::Origin => break,
                Via::Walk => {
                    let walk = labels.rounds[round].walk[stop.0]?;
                    legs.push(Leg::Transfer(Transfer::new(
                        self.model.stop(walk.from).id.clone(),
                        self.model.stop(stop).id.clone(),
                        walk.departure,
                        walk.duration_secs,
                    )));
                    stop = walk.from;
                    if round == 0 {
                        break;
                    }
                    via = Via::Ride;
                }
                Via::Ride => {
                    let ride = labels.rounds[round].ride[stop.0]?;
                    legs.push(Leg::Ride(self.ride_leg(&ride, stop)?));
                    stop = ride.board_stop;
                    round -= 1;
                    via = self.ready(labels, round, stop)?.1;
                }
            }
        }
        legs.reverse();

        match Itinerary::new(legs) {
            Ok(itinerary) => Some(itinerary),
            Err(err) => {
                warn!(%err, round, "Discarded inconsistent itinerary");
                None
            }
        }
    }

    fn ride_leg(&self, label: &RideLabel, alight_stop: StopIdx) -> Option<Ride> {
        let trip = self.model.trip(label.trip);
        let board = self.times.call(self.model, label.trip, label.board_pos);
        let alight = self.times.call(self.model, label.trip, label.alight_pos);
        match Ride::new(
            trip.id().clone(),
            trip.route().clone(),
            (self.model.stop(label.board_stop).id.clone(), board.departure),
            (self.model.stop(alight_stop).id.clone(), alight.arrival),
        ) {
            Ok(ride) => Some(ride),
            Err(err) => {
                warn!(%err, trip = %trip.id(), "Discarded inconsistent ride");
                None
            }
        }
    }

    fn trip_id(&self, trip: TripIdx) -> &TripId {
        self.model.trip(trip).id()
    }
}
