//! Transfer resolution between nearby stops.

use std::sync::Arc;

use moka::sync::Cache;
use tracing::trace;

use crate::domain::StopId;
use crate::network::{NetworkModel, StopIdx, TransferRule};

use super::config::TransferConfig;
use super::index::StopIndex;

/// A transfer between two different stops.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEdge {
    pub from: StopId,
    pub to: StopId,
    /// Walking (or published minimum) time
    pub duration_secs: u32,
    /// False when the pair is out of range or changing is not possible
    pub feasible: bool,
    /// Great-circle distance between the stops
    pub distance_m: f64,
    pub(crate) to_idx: StopIdx,
}

/// Cache key: (stop, radius in metres).
type EdgeKey = (StopIdx, u32);

/// Computes walking transfers for one network model.
///
/// Edge lists are cached per (stop, radius). The cache lives as long as the
/// resolver, and a resolver is built per model, so a schedule reload starts
/// with an empty cache.
pub struct TransferResolver {
    model: Arc<NetworkModel>,
    index: StopIndex,
    config: TransferConfig,
    cache: Cache<EdgeKey, Arc<Vec<TransferEdge>>>,
}

impl TransferResolver {
    pub fn new(model: Arc<NetworkModel>, config: &TransferConfig) -> Self {
        let index = StopIndex::build(&model);
        Self {
            model,
            index,
            config: config.clone(),
            cache: Cache::builder().max_capacity(config.cache_capacity).build(),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Feasible transfers from `stop` to other stops within `radius_m`.
    ///
    /// Published minimum-time rules are always included and override the
    /// walking estimate; pairs published as not possible are left out.
    /// Unknown stops have no transfers.
    pub fn transfers_from(&self, stop: &StopId, radius_m: u32) -> Arc<Vec<TransferEdge>> {
        match self.model.stop_idx(stop) {
            Some(idx) => self.edges_within(idx, radius_m),
            None => Arc::new(Vec::new()),
        }
    }

    /// Transfers from a stop using the configured default radius.
    pub(crate) fn edges_from(&self, stop: StopIdx) -> Arc<Vec<TransferEdge>> {
        self.edges_within(stop, self.config.walk_radius_m)
    }

    /// The edge between two specific stops, feasible or not.
    ///
    /// Returns `None` for a stop paired with itself or an unknown stop.
    pub fn edge_between(&self, from: &StopId, to: &StopId) -> Option<TransferEdge> {
        let from_idx = self.model.stop_idx(from)?;
        let to_idx = self.model.stop_idx(to)?;
        if from_idx == to_idx {
            return None;
        }

        let distance_m = self.distance(from_idx, to_idx);
        let walk = self.config.walk_secs(distance_m);
        let (duration_secs, feasible) = match self.model.transfer_rule(from_idx, to_idx) {
            Some(TransferRule::MinimumTime { min_transfer_secs }) => (min_transfer_secs, true),
            Some(TransferRule::NotPossible) => (walk, false),
            None => (
                walk,
                distance_m <= f64::from(self.config.walk_radius_m)
                    && walk <= self.config.max_transfer_secs,
            ),
        };

        Some(TransferEdge {
            from: from.clone(),
            to: to.clone(),
            duration_secs,
            feasible,
            distance_m,
            to_idx,
        })
    }

    /// Number of cached edge lists.
    pub fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn edges_within(&self, stop: StopIdx, radius_m: u32) -> Arc<Vec<TransferEdge>> {
        self.cache
            .get_with((stop, radius_m), || Arc::new(self.compute(stop, radius_m)))
    }

    fn compute(&self, from: StopIdx, radius_m: u32) -> Vec<TransferEdge> {
        let origin = self.model.stop(from);
        let radius = f64::from(radius_m);
        let rules = self.model.transfer_rules_from(from);

        let mut edges: Vec<TransferEdge> = self
            .index
            .candidates(&origin.location, radius)
            .filter(|to| *to != from)
            .filter(|to| rules.iter().all(|(stop, _)| stop != to))
            .filter_map(|to| {
                let distance_m = self.distance(from, to);
                let duration_secs = self.config.walk_secs(distance_m);
                (distance_m <= radius && duration_secs <= self.config.max_transfer_secs)
                    .then(|| self.edge(from, to, duration_secs, distance_m))
            })
            .collect();

        for (to, rule) in rules {
            if let TransferRule::MinimumTime { min_transfer_secs } = rule {
                let distance_m = self.distance(from, *to);
                edges.push(self.edge(from, *to, *min_transfer_secs, distance_m));
            }
        }

        edges.sort_by(|a, b| {
            a.duration_secs
                .cmp(&b.duration_secs)
                .then_with(|| a.to.cmp(&b.to))
        });

        trace!(stop = %origin.id, radius_m, edges = edges.len(), "Computed transfers");
        edges
    }

    fn edge(&self, from: StopIdx, to: StopIdx, duration_secs: u32, distance_m: f64) -> TransferEdge {
        TransferEdge {
            from: self.model.stop(from).id.clone(),
            to: self.model.stop(to).id.clone(),
            duration_secs,
            feasible: true,
            distance_m,
            to_idx: to,
        }
    }

    fn distance(&self, from: StopIdx, to: StopIdx) -> f64 {
        self.model
            .stop(from)
            .location
            .distance_m(&self.model.stop(to).location)
    }
}
