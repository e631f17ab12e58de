//! Engine configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::planner::SearchConfig;
use crate::realtime::RealtimeConfig;
use crate::transfers::TransferConfig;

use super::error::ConfigError;

/// Configuration for every part of the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub transfers: TransferConfig,
    pub realtime: RealtimeConfig,

    /// Queries running longer than this are cancelled.
    pub query_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            transfers: TransferConfig::default(),
            realtime: RealtimeConfig::default(),
            query_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TRANSIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `TRANSIT_MAX_TRANSFERS` | `search.max_transfers` |
    /// | `TRANSIT_MIN_TRANSFER_SECS` | `search.min_transfer_secs` |
    /// | `TRANSIT_MAX_RESULTS` | `search.max_results` |
    /// | `TRANSIT_PREFERRED_MAX_TRANSFERS` | `search.preferred_max_transfers` |
    /// | `TRANSIT_WALK_RADIUS_M` | `transfers.walk_radius_m` |
    /// | `TRANSIT_WALKING_SPEED_MPS` | `transfers.walking_speed_mps` |
    /// | `TRANSIT_MAX_WALK_SECS` | `transfers.max_transfer_secs` |
    /// | `TRANSIT_STALENESS_SECS` | `realtime.staleness` |
    /// | `TRANSIT_POLL_INTERVAL_SECS` | `realtime.poll_interval` |
    /// | `TRANSIT_QUERY_TIMEOUT_MS` | `query_timeout` |
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let env = Lookup(&lookup);

        env.set("TRANSIT_MAX_TRANSFERS", &mut config.search.max_transfers)?;
        env.set("TRANSIT_MIN_TRANSFER_SECS", &mut config.search.min_transfer_secs)?;
        env.set("TRANSIT_MAX_RESULTS", &mut config.search.max_results)?;
        env.set(
            "TRANSIT_PREFERRED_MAX_TRANSFERS",
            &mut config.search.preferred_max_transfers,
        )?;
        env.set("TRANSIT_WALK_RADIUS_M", &mut config.transfers.walk_radius_m)?;
        env.set("TRANSIT_WALKING_SPEED_MPS", &mut config.transfers.walking_speed_mps)?;
        env.set("TRANSIT_MAX_WALK_SECS", &mut config.transfers.max_transfer_secs)?;

        if let Some(secs) = env.get::<u64>("TRANSIT_STALENESS_SECS")? {
            config.realtime.staleness = Duration::from_secs(secs);
        }
        if let Some(secs) = env.get::<u64>("TRANSIT_POLL_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "TRANSIT_POLL_INTERVAL_SECS",
                    value: secs.to_string(),
                });
            }
            config.realtime.poll_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = env.get::<u64>("TRANSIT_QUERY_TIMEOUT_MS")? {
            config.query_timeout = Duration::from_millis(ms);
        }

        let speed = config.transfers.walking_speed_mps;
        if speed.is_nan() || speed <= 0.0 {
            return Err(ConfigError::Invalid {
                var: "TRANSIT_WALKING_SPEED_MPS",
                value: speed.to_string(),
            });
        }
        Ok(config)
    }
}

struct Lookup<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    fn get<T: FromStr>(&self, var: &'static str) -> Result<Option<T>, ConfigError> {
        match (self.0)(var) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid { var, value }),
        }
    }

    fn set<T: FromStr>(&self, var: &'static str, field: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.get(var)? {
            *field = value;
        }
        Ok(())
    }
}
