//! Journey queries.

use serde::{Deserialize, Serialize};

use crate::domain::{ServiceTime, StopId};
use crate::network::{NetworkModel, StopIdx};

use super::error::SearchError;

/// When the rider wants to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "time")]
pub enum TimeReference {
    /// Leave no earlier than this time
    DepartAfter(ServiceTime),
    /// Arrive no later than this time
    ArriveBy(ServiceTime),
}

impl TimeReference {
    pub fn time(&self) -> ServiceTime {
        match self {
            TimeReference::DepartAfter(t) | TimeReference::ArriveBy(t) => *t,
        }
    }
}

/// A strictly-typed journey query over canonical stop ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub origins: Vec<StopId>,
    pub destinations: Vec<StopId>,
    pub time: TimeReference,
    /// Overrides the configured transfer bound
    pub max_transfers: Option<usize>,
}

impl Query {
    /// A single-origin, single-destination departure query.
    pub fn depart_after(origin: StopId, destination: StopId, time: ServiceTime) -> Self {
        Self {
            origins: vec![origin],
            destinations: vec![destination],
            time: TimeReference::DepartAfter(time),
            max_transfers: None,
        }
    }

    /// A single-origin, single-destination arrival query.
    pub fn arrive_by(origin: StopId, destination: StopId, time: ServiceTime) -> Self {
        Self {
            origins: vec![origin],
            destinations: vec![destination],
            time: TimeReference::ArriveBy(time),
            max_transfers: None,
        }
    }

    pub fn with_max_transfers(mut self, max_transfers: usize) -> Self {
        self.max_transfers = Some(max_transfers);
        self
    }

    /// Check the query against a model and resolve its stops.
    pub(crate) fn resolve(&self, model: &NetworkModel) -> Result<ResolvedQuery, SearchError> {
        if self.origins.is_empty() {
            return Err(SearchError::InvalidQuery("no origin stop".to_string()));
        }
        if self.destinations.is_empty() {
            return Err(SearchError::InvalidQuery("no destination stop".to_string()));
        }

        let time = self.time.time();
        if time > model.service_end() {
            return Err(SearchError::InvalidQuery(format!(
                "time {time} is outside the loaded schedule (ends {})",
                model.service_end()
            )));
        }

        let origins = resolve_stops(model, &self.origins)?;
        let destinations = resolve_stops(model, &self.destinations)?;
        if let Some(shared) = origins.iter().find(|s| destinations.contains(s)) {
            return Err(SearchError::InvalidQuery(format!(
                "stop {} is both origin and destination",
                model.stop(*shared).id
            )));
        }

        Ok(ResolvedQuery {
            origins,
            destinations,
        })
    }
}

/// Query stops as model indices.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedQuery {
    pub(crate) origins: Vec<StopIdx>,
    pub(crate) destinations: Vec<StopIdx>,
}

fn resolve_stops(model: &NetworkModel, ids: &[StopId]) -> Result<Vec<StopIdx>, SearchError> {
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        let idx = model
            .stop_idx(id)
            .ok_or_else(|| SearchError::InvalidQuery(format!("unknown stop {id}")))?;
        if !resolved.contains(&idx) {
            resolved.push(idx);
        }
    }
    Ok(resolved)
}
