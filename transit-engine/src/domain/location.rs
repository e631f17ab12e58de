//! Geographic coordinates.

use std::fmt;

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    /// Create coordinates, rejecting values outside the valid range.
    ///
    /// ```
    /// use transit_engine::domain::Coordinates;
    ///
    /// assert!(Coordinates::new(51.5, -0.12).is_ok());
    /// assert!(Coordinates::new(91.0, 0.0).is_err());
    /// assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    /// ```
    pub fn new(lat: f64, lon: f64) -> Result<Self, DomainError> {
        let in_range = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
        if !in_range {
            return Err(DomainError::InvalidCoordinates { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Returns the position as a `geo` point (x = longitude, y = latitude).
    pub fn point(&self) -> Point {
        Point::new(self.lon, self.lat)
    }

    /// Great-circle distance in metres.
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        self.point().haversine_distance(&other.point())
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}
