//! Scheduled trips.

use super::{DomainError, RouteId, ServiceTime, StopId, TripId};

/// One scheduled call of a trip at a stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTime {
    pub stop: StopId,
    pub arrival: ServiceTime,
    pub departure: ServiceTime,
}

impl StopTime {
    pub fn new(stop: StopId, arrival: ServiceTime, departure: ServiceTime) -> Self {
        Self {
            stop,
            arrival,
            departure,
        }
    }
}

/// A single scheduled run of a route.
///
/// # Invariants
///
/// - At least two stop times
/// - At every stop, `arrival <= departure`
/// - Each arrival is no earlier than the previous stop's departure
#[derive(Debug, Clone)]
pub struct Trip {
    id: TripId,
    route: RouteId,
    headsign: Option<String>,
    stop_times: Vec<StopTime>,
}

impl Trip {
    /// Build a trip, validating its timetable.
    ///
    /// ```
    /// use transit_engine::domain::{RouteId, ServiceTime, StopId, StopTime, Trip, TripId};
    ///
    /// let t = |s| ServiceTime::parse(s).unwrap();
    /// let stop = |s| StopId::parse(s).unwrap();
    ///
    /// let trip = Trip::new(
    ///     TripId::parse("T1").unwrap(),
    ///     RouteId::parse("R1").unwrap(),
    ///     None,
    ///     vec![
    ///         StopTime::new(stop("A"), t("08:00"), t("08:00")),
    ///         StopTime::new(stop("B"), t("08:15"), t("08:16")),
    ///     ],
    /// )
    /// .unwrap();
    /// assert_eq!(trip.stop_times().len(), 2);
    ///
    /// // Going back in time is rejected
    /// let backwards = Trip::new(
    ///     TripId::parse("T2").unwrap(),
    ///     RouteId::parse("R1").unwrap(),
    ///     None,
    ///     vec![
    ///         StopTime::new(stop("A"), t("08:00"), t("08:00")),
    ///         StopTime::new(stop("B"), t("07:59"), t("08:01")),
    ///     ],
    /// );
    /// assert!(backwards.is_err());
    /// ```
    pub fn new(
        id: TripId,
        route: RouteId,
        headsign: Option<String>,
        stop_times: Vec<StopTime>,
    ) -> Result<Self, DomainError> {
        if stop_times.len() < 2 {
            return Err(DomainError::TooFewStops);
        }

        let mut previous_departure = ServiceTime::MIDNIGHT;
        for (position, st) in stop_times.iter().enumerate() {
            if st.arrival > st.departure || st.arrival < previous_departure {
                return Err(DomainError::NonMonotonicTimes {
                    stop: st.stop.clone(),
                    position,
                });
            }
            previous_departure = st.departure;
        }

        Ok(Self {
            id,
            route,
            headsign,
            stop_times,
        })
    }

    pub fn id(&self) -> &TripId {
        &self.id
    }

    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn headsign(&self) -> Option<&str> {
        self.headsign.as_deref()
    }

    pub fn stop_times(&self) -> &[StopTime] {
        &self.stop_times
    }

    /// Scheduled departure from the first stop.
    pub fn first_departure(&self) -> ServiceTime {
        self.stop_times[0].departure
    }

    /// Scheduled arrival at the last stop.
    pub fn last_arrival(&self) -> ServiceTime {
        self.stop_times[self.stop_times.len() - 1].arrival
    }

    /// Returns the stop sequence in calling order.
    pub fn stops(&self) -> impl Iterator<Item = &StopId> {
        self.stop_times.iter().map(|st| &st.stop)
    }

    /// Position of the first call at `stop`, if any.
    pub fn position_of(&self, stop: &StopId) -> Option<usize> {
        self.stop_times.iter().position(|st| &st.stop == stop)
    }
}
