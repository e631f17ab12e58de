//! Stops and routes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Coordinates, RouteId, StopId};

/// A boarding location.
///
/// Stops are owned by the network model and referenced by id everywhere
/// else. `routes` is filled in when the model is built.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub location: Coordinates,
    /// Alternative names the stop is known by
    pub aliases: Vec<String>,
    /// Routes with at least one trip calling here
    pub routes: BTreeSet<RouteId>,
}

impl Stop {
    /// Creates a stop with no aliases and no routes.
    pub fn new(id: StopId, name: impl Into<String>, location: Coordinates) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            aliases: Vec::new(),
            routes: BTreeSet::new(),
        }
    }

    /// Returns true if `query` matches the name or an alias, ignoring case.
    pub fn answers_to(&self, query: &str) -> bool {
        let query = query.trim();
        self.name.eq_ignore_ascii_case(query)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(query))
    }
}

/// The vehicle type operating a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Bus,
    Metro,
    Tram,
    Rail,
    Ferry,
    Other,
}

impl Mode {
    /// Maps a GTFS `route_type` to a mode.
    ///
    /// Extended route types (100-1700) are grouped by their hundreds.
    pub fn from_gtfs_route_type(route_type: u16) -> Self {
        match route_type {
            0 | 900..=999 => Mode::Tram,
            1 | 400..=499 => Mode::Metro,
            2 | 100..=199 => Mode::Rail,
            3 | 11 | 700..=799 | 800..=899 => Mode::Bus,
            4 | 1000..=1099 | 1200..=1299 => Mode::Ferry,
            _ => Mode::Other,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Bus => "bus",
            Mode::Metro => "metro",
            Mode::Tram => "tram",
            Mode::Rail => "rail",
            Mode::Ferry => "ferry",
            Mode::Other => "other",
        };
        f.write_str(s)
    }
}

/// A line: a named group of trips run with one mode.
///
/// The stop sequence can vary between trips; the network model groups
/// trips with identical sequences into patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub mode: Mode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_matches_name_and_aliases() {
        let mut stop = Stop::new(
            StopId::parse("KGX").unwrap(),
            "King's Cross",
            Coordinates::new(51.53, -0.12).unwrap(),
        );
        stop.aliases.push("Kings Cross".into());

        assert!(stop.answers_to("king's cross"));
        assert!(stop.answers_to(" KINGS CROSS "));
        assert!(!stop.answers_to("St Pancras"));
    }

    #[test]
    fn gtfs_route_types() {
        assert_eq!(Mode::from_gtfs_route_type(0), Mode::Tram);
        assert_eq!(Mode::from_gtfs_route_type(1), Mode::Metro);
        assert_eq!(Mode::from_gtfs_route_type(2), Mode::Rail);
        assert_eq!(Mode::from_gtfs_route_type(3), Mode::Bus);
        assert_eq!(Mode::from_gtfs_route_type(4), Mode::Ferry);
        assert_eq!(Mode::from_gtfs_route_type(7), Mode::Other);
        assert_eq!(Mode::from_gtfs_route_type(700), Mode::Bus);
        assert_eq!(Mode::from_gtfs_route_type(109), Mode::Rail);
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Metro).unwrap(), "\"metro\"");
        let m: Mode = serde_json::from_str("\"tram\"").unwrap();
        assert_eq!(m, Mode::Tram);
    }
}
