//! Identifier types for stops, routes and trips.
//!
//! Feed identifiers are opaque strings. The only thing we enforce is that
//! they are non-empty and carry no surrounding whitespace, so that two
//! spellings of the same id can't end up as different map keys.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing an invalid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {reason}")]
pub struct InvalidId {
    kind: &'static str,
    reason: &'static str,
}

fn validate(kind: &'static str, s: &str) -> Result<(), InvalidId> {
    if s.is_empty() {
        return Err(InvalidId {
            kind,
            reason: "must not be empty",
        });
    }
    if s.trim() != s {
        return Err(InvalidId {
            kind,
            reason: "must not have leading or trailing whitespace",
        });
    }
    Ok(())
}

macro_rules! feed_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty or padded strings.
            pub fn parse(s: &str) -> Result<Self, InvalidId> {
                validate($kind, s)?;
                Ok(Self(s.to_string()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

feed_id!(
    /// Identifier of a stop (a boarding location).
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_engine::domain::StopId;
    ///
    /// let stop = StopId::parse("central").unwrap();
    /// assert_eq!(stop.as_str(), "central");
    ///
    /// assert!(StopId::parse("").is_err());
    /// assert!(StopId::parse(" central").is_err());
    /// ```
    StopId,
    "stop"
);

feed_id!(
    /// Identifier of a route (a line, such as "Route 1").
    RouteId,
    "route"
);

feed_id!(
    /// Identifier of a single scheduled trip.
    ///
    /// Trip ids order lexicographically; the planner relies on that order
    /// to break ties between trips departing at the same time.
    TripId,
    "trip"
);
