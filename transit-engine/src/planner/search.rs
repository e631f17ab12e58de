//! Journey search entry point.
//!
//! Wraps the round-based scan with query validation, arrive-by probing,
//! and the final Pareto filtering and ranking.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{Itinerary, ServiceTime};
use crate::network::{NetworkModel, StopIdx};
use crate::realtime::RealtimeOverlay;
use crate::transfers::TransferResolver;

use super::cancel::CancelToken;
use super::config::SearchConfig;
use super::error::SearchError;
use super::query::{Query, ResolvedQuery, TimeReference};
use super::raptor::Raptor;
use super::rank::{recommend, remove_dominated};
use super::timetable::EffectiveTimes;

/// Result of journey search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Pareto-optimal itineraries, ranked best-first.
    pub itineraries: Vec<Itinerary>,

    /// Index into `itineraries` of the suggested option.
    pub recommended: Option<usize>,

    /// Number of rounds scanned (summed over arrive-by attempts).
    pub rounds: usize,
}

impl SearchResult {
    pub fn recommended_itinerary(&self) -> Option<&Itinerary> {
        self.recommended.and_then(|i| self.itineraries.get(i))
    }
}

/// Journey planner over one network model.
pub struct Planner<'a> {
    model: &'a NetworkModel,
    transfers: &'a TransferResolver,
    config: &'a SearchConfig,
    times: EffectiveTimes,
}

impl<'a> Planner<'a> {
    /// Create a planner using scheduled times only.
    pub fn new(
        model: &'a NetworkModel,
        transfers: &'a TransferResolver,
        config: &'a SearchConfig,
    ) -> Self {
        Self {
            model,
            transfers,
            config,
            times: EffectiveTimes::scheduled(),
        }
    }

    /// Use realtime data that is fresh as of `now`.
    ///
    /// The overlay is read once here; later updates do not affect searches
    /// made with this planner.
    pub fn with_overlay(mut self, overlay: &RealtimeOverlay, now: DateTime<Utc>) -> Self {
        self.times = EffectiveTimes::capture(self.model, overlay, now);
        self
    }

    /// Search for itineraries answering `query`.
    pub fn search(&self, query: &Query, cancel: &CancelToken) -> Result<SearchResult, SearchError> {
        let resolved = query.resolve(self.model)?;
        let max_transfers = query.max_transfers.unwrap_or(self.config.max_transfers);
        let max_rides = max_transfers + 1;
        let raptor = Raptor::new(self.model, self.transfers, self.config, &self.times);

        let (itineraries, rounds) = match query.time {
            TimeReference::DepartAfter(departure) => {
                let output = raptor.run(
                    &resolved.origins,
                    &resolved.destinations,
                    departure,
                    max_rides,
                    cancel,
                )?;
                (output.itineraries, output.rounds)
            }
            TimeReference::ArriveBy(deadline) => {
                self.arrive_by(&raptor, &resolved, deadline, max_rides, cancel)?
            }
        };

        let mut itineraries = remove_dominated(itineraries);
        if itineraries.is_empty() {
            debug!(rounds, max_transfers, "No route found");
            return Err(SearchError::NoRouteFound {
                origins: query.origins.clone(),
                destinations: query.destinations.clone(),
                max_transfers,
            });
        }
        itineraries.truncate(self.config.max_results);
        let recommended = recommend(&itineraries, self.config.preferred_max_transfers);

        info!(
            found = itineraries.len(),
            rounds,
            realtime_trips = self.times.len(),
            "Search complete"
        );
        Ok(SearchResult {
            itineraries,
            recommended,
            rounds,
        })
    }

    /// Answer an arrive-by query by probing departure times, latest first.
    ///
    /// Returns the first attempt whose itineraries make the deadline.
    fn arrive_by(
        &self,
        raptor: &Raptor<'_>,
        query: &ResolvedQuery,
        deadline: ServiceTime,
        max_rides: usize,
        cancel: &CancelToken,
    ) -> Result<(Vec<Itinerary>, usize), SearchError> {
        let earliest = deadline
            .minus_secs(self.config.arrive_by_window_secs)
            .unwrap_or(ServiceTime::MIDNIGHT);

        let mut candidates = BTreeSet::new();
        for &origin in &query.origins {
            self.departure_candidates(origin, 0, earliest, deadline, &mut candidates);
            for edge in self.transfers.edges_from(origin).iter() {
                self.departure_candidates(
                    edge.to_idx,
                    edge.duration_secs,
                    earliest,
                    deadline,
                    &mut candidates,
                );
            }
        }
        debug!(candidates = candidates.len(), %earliest, %deadline, "Arrive-by attempts");

        let mut rounds = 0;
        for departure in candidates
            .into_iter()
            .rev()
            .take(self.config.max_arrive_by_attempts)
        {
            let output = raptor.run(
                &query.origins,
                &query.destinations,
                departure,
                max_rides,
                cancel,
            )?;
            rounds += output.rounds;

            let arriving: Vec<_> = output
                .itineraries
                .into_iter()
                .filter(|i| i.arrival_time() <= deadline)
                .collect();
            if !arriving.is_empty() {
                debug!(%departure, found = arriving.len(), "Arrive-by attempt succeeded");
                return Ok((arriving, rounds));
            }
        }
        Ok((Vec::new(), rounds))
    }

    /// Times to leave an origin so as to catch a departure from `stop`
    /// after walking `walk_secs`.
    fn departure_candidates(
        &self,
        stop: StopIdx,
        walk_secs: u32,
        earliest: ServiceTime,
        deadline: ServiceTime,
        out: &mut BTreeSet<ServiceTime>,
    ) {
        for departure in self.model.departures_at(stop) {
            let call = self
                .times
                .call(self.model, departure.trip, departure.position);
            if call.cancelled {
                continue;
            }
            if let Some(leave) = call.departure.minus_secs(walk_secs) {
                if leave >= earliest && leave <= deadline {
                    out.insert(leave);
                }
            }
        }
    }
}
