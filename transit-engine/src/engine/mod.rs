//! Query/result façade.
//!
//! [`TransitEngine`] is what collaborators call. It owns the published
//! network snapshot and the realtime overlay, turns loosely-typed requests
//! into planner queries, and runs each search on the blocking pool under a
//! timeout.
//!
//! Schedule reloads build a complete new snapshot before taking the write
//! lock, so a query always reads one consistent snapshot from start to
//! finish.

mod config;
mod dto;
mod error;
mod poller;
mod resolver;

pub use config::EngineConfig;
pub use dto::{
    ItineraryResult, ItinerarySetResponse, JourneyRequest, LegResult, NextDeparture, RideResult,
    StopInfo, TransferResult,
};
pub use error::{ConfigError, PlanError};
pub use poller::spawn_feed_poller;
pub use resolver::{ExactNameResolver, StopRef, StopResolver};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{Itinerary, ServiceTime, StopId};
use crate::network::{Departure, NetworkModel, ScheduleError, ScheduleFormat};
use crate::planner::{CancelToken, EffectiveTimes, Planner, Query};
use crate::realtime::{
    ApplyOutcome, ApplySummary, RealtimeError, RealtimeOverlay, RealtimeUpdate, decode_feed,
    updates_from_feed,
};
use crate::transfers::TransferResolver;

/// An immutable, versioned network with its transfer resolver.
pub struct NetworkSnapshot {
    version: u64,
    model: Arc<NetworkModel>,
    transfers: TransferResolver,
    loaded_at: DateTime<Utc>,
}

impl NetworkSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn model(&self) -> &NetworkModel {
        &self.model
    }

    pub fn transfers(&self) -> &TransferResolver {
        &self.transfers
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// The answer to a journey request.
#[derive(Debug, Clone)]
pub struct ItinerarySet {
    /// Version of the snapshot the search ran on
    pub snapshot_version: u64,

    /// Pareto-optimal itineraries, best first
    pub itineraries: Vec<Itinerary>,

    /// Index into `itineraries` of the suggested option
    pub recommended: Option<usize>,

    pub rounds: usize,

    model: Arc<NetworkModel>,
}

impl ItinerarySet {
    pub fn recommended_itinerary(&self) -> Option<&Itinerary> {
        self.recommended.and_then(|i| self.itineraries.get(i))
    }

    /// Shape for serialization, with stop names from the snapshot searched.
    pub fn to_response(&self) -> ItinerarySetResponse {
        ItinerarySetResponse {
            snapshot_version: self.snapshot_version,
            itineraries: self
                .itineraries
                .iter()
                .map(|i| ItineraryResult::from_itinerary(i, &self.model))
                .collect(),
            recommended: self.recommended,
            rounds: self.rounds,
        }
    }
}

/// Shared journey-planning engine.
///
/// Cheap to clone; clones share the snapshot, overlay and configuration.
#[derive(Clone)]
pub struct TransitEngine {
    snapshot: Arc<RwLock<Option<Arc<NetworkSnapshot>>>>,
    overlay: Arc<RealtimeOverlay>,
    resolver: Arc<dyn StopResolver>,
    config: Arc<EngineConfig>,
    versions: Arc<AtomicU64>,
}

impl TransitEngine {
    /// Create an engine with no schedule loaded, resolving names exactly.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_resolver(config, ExactNameResolver)
    }

    /// Create an engine that resolves stop names with `resolver`.
    pub fn with_resolver(config: EngineConfig, resolver: impl StopResolver + 'static) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(None)),
            overlay: Arc::new(RealtimeOverlay::new(&config.realtime)),
            resolver: Arc::new(resolver),
            config: Arc::new(config),
            versions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn overlay(&self) -> &RealtimeOverlay {
        &self.overlay
    }

    /// The currently published snapshot, if a schedule has been loaded.
    pub async fn snapshot(&self) -> Option<Arc<NetworkSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Decode, validate and publish a schedule. Returns the new version.
    ///
    /// On error the previously published snapshot stays in place.
    pub async fn load_schedule(
        &self,
        bytes: &[u8],
        format: ScheduleFormat,
    ) -> Result<u64, ScheduleError> {
        // Decoding and indexing a large feed takes a while; keep it off the
        // async workers.
        let bytes = bytes.to_vec();
        let transfer_config = self.config.transfers.clone();
        let built = tokio::task::spawn_blocking(move || {
            let model = Arc::new(NetworkModel::from_bytes(&bytes, format)?);
            let transfers = TransferResolver::new(model.clone(), &transfer_config);
            Ok::<_, ScheduleError>((model, transfers))
        })
        .await
        .unwrap_or_else(|e| Err(ScheduleError::Aborted(e.to_string())));

        let (model, transfers) = match built {
            Ok(built) => built,
            Err(e) => {
                warn!(error = %e, "Schedule load failed, keeping current snapshot");
                return Err(e);
            }
        };
        let version = self.versions.fetch_add(1, Ordering::Relaxed) + 1;
        let stops = model.stops().len();
        let trips = model.trips().len();

        let snapshot = Arc::new(NetworkSnapshot {
            version,
            model,
            transfers,
            loaded_at: Utc::now(),
        });
        *self.snapshot.write().await = Some(snapshot);

        info!(version, stops, trips, "Published schedule snapshot");
        Ok(version)
    }

    /// Store one realtime update.
    pub fn apply_realtime_update(&self, update: RealtimeUpdate) -> ApplyOutcome {
        self.overlay.apply(update)
    }

    /// Decode a GTFS-Realtime feed and apply its trip updates.
    ///
    /// Trips not in the current snapshot are ignored.
    pub async fn apply_realtime_feed(&self, bytes: &[u8]) -> Result<ApplySummary, RealtimeError> {
        let feed = decode_feed(bytes)?;
        let snapshot = self
            .snapshot()
            .await
            .ok_or_else(|| RealtimeError::Source("no schedule loaded".to_string()))?;

        let updates = updates_from_feed(&feed, snapshot.model(), Utc::now());
        let summary = self.overlay.apply_all(updates);
        debug!(
            applied = summary.applied,
            discarded = summary.discarded,
            "Applied realtime feed"
        );
        Ok(summary)
    }

    /// Resolve a stop reference against the current snapshot.
    pub async fn resolve_stop(&self, stop: &StopRef) -> Result<StopId, PlanError> {
        let snapshot = self.snapshot().await.ok_or(PlanError::NoSchedule)?;
        resolver::resolve_stop(snapshot.model(), self.resolver.as_ref(), stop)
    }

    /// Plan a journey.
    ///
    /// A name matching several stops plans from (or to) all of them.
    ///
    /// The search runs on the blocking pool. If it exceeds the configured
    /// timeout it is cancelled and [`PlanError::Timeout`] is returned.
    pub async fn plan_journey(&self, request: JourneyRequest) -> Result<ItinerarySet, PlanError> {
        let snapshot = self.snapshot().await.ok_or(PlanError::NoSchedule)?;
        let model = snapshot.model();
        let origins = resolver::resolve_stops(model, self.resolver.as_ref(), &request.origin)?;
        let destinations =
            resolver::resolve_stops(model, self.resolver.as_ref(), &request.destination)?;

        let query = Query {
            origins,
            destinations,
            time: request.time,
            max_transfers: request.max_transfers,
        };
        debug!(?query, version = snapshot.version(), "Planning journey");

        let cancel = CancelToken::new();
        let task = {
            let snapshot = snapshot.clone();
            let overlay = self.overlay.clone();
            let config = self.config.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                Planner::new(snapshot.model(), snapshot.transfers(), &config.search)
                    .with_overlay(&overlay, Utc::now())
                    .search(&query, &cancel)
            })
        };

        let timeout = self.config.query_timeout;
        let result = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(PlanError::Internal(e.to_string())),
            Err(_) => {
                cancel.cancel();
                warn!(?timeout, "Journey search timed out");
                return Err(PlanError::Timeout(timeout));
            }
        };

        Ok(ItinerarySet {
            snapshot_version: snapshot.version(),
            itineraries: result.itineraries,
            recommended: result.recommended,
            rounds: result.rounds,
            model: snapshot.model.clone(),
        })
    }

    /// Plan several journeys concurrently.
    pub async fn plan_journeys(
        &self,
        requests: Vec<JourneyRequest>,
    ) -> Vec<Result<ItinerarySet, PlanError>> {
        join_all(requests.into_iter().map(|r| self.plan_journey(r))).await
    }

    /// The next `limit` departures at or after `after` from every stop
    /// `stop` matches.
    ///
    /// Times include fresh realtime delays. Cancelled calls are left out.
    pub async fn next_departures(
        &self,
        stop: &StopRef,
        after: ServiceTime,
        limit: usize,
    ) -> Result<Vec<NextDeparture>, PlanError> {
        let snapshot = self.snapshot().await.ok_or(PlanError::NoSchedule)?;
        let model = snapshot.model();
        let ids = resolver::resolve_stops(model, self.resolver.as_ref(), stop)?;
        let times = EffectiveTimes::capture(model, &self.overlay, Utc::now());

        // Trips without realtime data leave exactly as scheduled, so the
        // sorted index bounds them. A delayed trip can be scheduled before
        // `after` yet leave after it, so realtime calls are added separately.
        let mut candidates: Vec<Departure> = Vec::new();
        for id in &ids {
            let Some(idx) = model.stop_idx(id) else {
                continue;
            };
            candidates.extend(
                model
                    .departures_after(idx, after)
                    .iter()
                    .filter(|d| !times.is_realtime(d.trip))
                    .take(limit),
            );
        }
        for trip in times.realtime_trips() {
            let stop_times = model.trip(trip).stop_times();
            let last = stop_times.len().saturating_sub(1);
            candidates.extend(
                stop_times
                    .iter()
                    .enumerate()
                    .take(last)
                    .filter(|(_, st)| ids.contains(&st.stop))
                    .map(|(position, st)| Departure {
                        time: st.departure,
                        trip,
                        position,
                    }),
            );
        }

        let mut departures: Vec<NextDeparture> = candidates
            .into_iter()
            .filter_map(|d| {
                let call = times.call(model, d.trip, d.position);
                if call.cancelled || call.departure < after {
                    return None;
                }
                let trip = model.trip(d.trip);
                let route = model
                    .route(trip.route())
                    .map(|r| r.name.clone())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| trip.route().to_string());
                Some(NextDeparture {
                    stop: trip.stop_times()[d.position].stop.clone(),
                    trip: trip.id().clone(),
                    route,
                    headsign: trip.headsign().map(str::to_string),
                    scheduled: d.time,
                    expected: call.departure,
                    delay_secs: call.departure.secs_since(d.time),
                })
            })
            .collect();

        departures.sort_by(|a, b| a.expected.cmp(&b.expected).then_with(|| a.trip.cmp(&b.trip)));
        departures.truncate(limit);
        Ok(departures)
    }
}
