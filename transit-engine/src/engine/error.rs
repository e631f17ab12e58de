//! Errors returned to callers of the engine.

use std::time::Duration;

use crate::planner::SearchError;

/// Error from planning a journey or answering a stop query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Bad stop reference or out-of-range time
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Valid query, but nothing reaches the destination within bounds
    #[error("{0}")]
    NoRouteFound(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("no schedule loaded")]
    NoSchedule,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SearchError> for PlanError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidQuery(msg) => PlanError::InvalidQuery(msg),
            SearchError::NoRouteFound { .. } => PlanError::NoRouteFound(e.to_string()),
            SearchError::Cancelled => PlanError::Cancelled,
        }
    }
}

impl PlanError {
    /// Returns true for a well-formed query with no answer.
    pub fn is_no_route(&self) -> bool {
        matches!(self, PlanError::NoRouteFound(_))
    }
}

/// Error reading engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}
