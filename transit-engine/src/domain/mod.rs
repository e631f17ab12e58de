//! Domain types for the transit journey planner.
//!
//! This module contains the core domain model types that represent
//! validated timetable data and planned itineraries. All types enforce their
//! invariants at construction time, so code that receives these types can
//! trust their validity.

mod error;
mod ids;
mod itinerary;
mod location;
mod stop;
mod time;
mod trip;

pub use error::DomainError;
pub use ids::{InvalidId, RouteId, StopId, TripId};
pub use itinerary::{Itinerary, Leg, Ride, Transfer};
pub use location::Coordinates;
pub use stop::{Mode, Route, Stop};
pub use time::{ServiceTime, TimeError};
pub use trip::{StopTime, Trip};
