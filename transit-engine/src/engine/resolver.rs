//! Turning caller-supplied stop references into canonical stop ids.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::StopId;
use crate::network::NetworkModel;

use super::error::PlanError;

/// A stop as named by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRef {
    /// A canonical stop id
    Id(StopId),
    /// A stop name or alias, matched by the engine's [`StopResolver`]
    Name(String),
}

impl StopRef {
    pub fn id(id: StopId) -> Self {
        StopRef::Id(id)
    }

    pub fn name(name: impl Into<String>) -> Self {
        StopRef::Name(name.into())
    }
}

impl fmt::Display for StopRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopRef::Id(id) => write!(f, "stop {id}"),
            StopRef::Name(name) => write!(f, "{name:?}"),
        }
    }
}

/// Matches free-text stop names against a network.
///
/// Fuzzy matching lives behind this trait so the engine never handles
/// free text itself. Journeys are planned from and to every candidate, so
/// a resolver should only return stops it is confident about.
pub trait StopResolver: Send + Sync {
    /// Stops that `name` could refer to, best match first.
    fn candidates(&self, model: &NetworkModel, name: &str) -> Vec<StopId>;
}

/// Case-insensitive exact match on stop names and aliases.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactNameResolver;

impl StopResolver for ExactNameResolver {
    fn candidates(&self, model: &NetworkModel, name: &str) -> Vec<StopId> {
        model
            .stops()
            .iter()
            .filter(|stop| stop.answers_to(name))
            .map(|stop| stop.id.clone())
            .collect()
    }
}

/// Resolve a stop reference to every stop in `model` it could mean.
///
/// Platforms of one station often share a name; planning treats them as
/// alternative origins or destinations.
pub(crate) fn resolve_stops(
    model: &NetworkModel,
    resolver: &dyn StopResolver,
    stop: &StopRef,
) -> Result<Vec<StopId>, PlanError> {
    match stop {
        StopRef::Id(id) => model
            .stop_by_id(id)
            .map(|s| vec![s.id.clone()])
            .ok_or_else(|| PlanError::InvalidQuery(format!("unknown stop {id}"))),
        StopRef::Name(name) => {
            let mut candidates = resolver.candidates(model, name.trim());
            candidates.retain(|id| model.stop_by_id(id).is_some());
            let mut seen = HashSet::new();
            candidates.retain(|id| seen.insert(id.clone()));
            if candidates.is_empty() {
                return Err(PlanError::InvalidQuery(format!("no stop matches {name:?}")));
            }
            Ok(candidates)
        }
    }
}

/// Resolve a stop reference to exactly one stop in `model`.
pub(crate) fn resolve_stop(
    model: &NetworkModel,
    resolver: &dyn StopResolver,
    stop: &StopRef,
) -> Result<StopId, PlanError> {
    let mut candidates = resolve_stops(model, resolver, stop)?;
    if candidates.len() > 1 {
        return Err(PlanError::InvalidQuery(format!(
            "{stop} is ambiguous: {}",
            candidates
                .iter()
                .map(StopId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(candidates.remove(0))
}
