//! Itinerary types.
//!
//! An `Itinerary` is a complete answer to a journey query: rides on
//! scheduled trips, joined by transfers (walks between stops).

use super::{DomainError, RouteId, ServiceTime, StopId, TripId};

/// A ride on one trip from a boarding stop to an alighting stop.
///
/// Times are the effective (realtime-adjusted) times used by the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ride {
    pub trip: TripId,
    pub route: RouteId,
    pub board_stop: StopId,
    pub board_time: ServiceTime,
    pub alight_stop: StopId,
    pub alight_time: ServiceTime,
}

impl Ride {
    /// Construct a ride, checking that it does not go back in time.
    pub fn new(
        trip: TripId,
        route: RouteId,
        board: (StopId, ServiceTime),
        alight: (StopId, ServiceTime),
    ) -> Result<Self, DomainError> {
        if alight.1 < board.1 {
            return Err(DomainError::InvalidLeg("alight must not precede board"));
        }
        Ok(Self {
            trip,
            route,
            board_stop: board.0,
            board_time: board.1,
            alight_stop: alight.0,
            alight_time: alight.1,
        })
    }

    pub fn duration_secs(&self) -> u32 {
        self.alight_time.as_secs() - self.board_time.as_secs()
    }
}

/// A walk between two different stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: StopId,
    pub to: StopId,
    /// When the walk starts
    pub departure: ServiceTime,
    pub duration_secs: u32,
}

impl Transfer {
    pub fn new(from: StopId, to: StopId, departure: ServiceTime, duration_secs: u32) -> Self {
        Self {
            from,
            to,
            departure,
            duration_secs,
        }
    }

    pub fn arrival(&self) -> ServiceTime {
        self.departure.plus_secs(self.duration_secs)
    }
}

/// One leg of an itinerary: either a ride or a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leg {
    Ride(Ride),
    Transfer(Transfer),
}

impl Leg {
    /// Returns the stop this leg starts from.
    pub fn start_stop(&self) -> &StopId {
        match self {
            Leg::Ride(ride) => &ride.board_stop,
            Leg::Transfer(transfer) => &transfer.from,
        }
    }

    /// Returns the stop this leg ends at.
    pub fn end_stop(&self) -> &StopId {
        match self {
            Leg::Ride(ride) => &ride.alight_stop,
            Leg::Transfer(transfer) => &transfer.to,
        }
    }

    pub fn start_time(&self) -> ServiceTime {
        match self {
            Leg::Ride(ride) => ride.board_time,
            Leg::Transfer(transfer) => transfer.departure,
        }
    }

    pub fn end_time(&self) -> ServiceTime {
        match self {
            Leg::Ride(ride) => ride.alight_time,
            Leg::Transfer(transfer) => transfer.arrival(),
        }
    }

    pub fn as_ride(&self) -> Option<&Ride> {
        match self {
            Leg::Ride(ride) => Some(ride),
            Leg::Transfer(_) => None,
        }
    }

    pub fn as_transfer(&self) -> Option<&Transfer> {
        match self {
            Leg::Ride(_) => None,
            Leg::Transfer(transfer) => Some(transfer),
        }
    }

    pub fn is_ride(&self) -> bool {
        matches!(self, Leg::Ride(_))
    }
}

/// A complete journey from origin to destination.
///
/// # Invariants
///
/// - At least one leg
/// - Consecutive legs connect (end stop of one = start stop of the next)
/// - Each leg ends no later than the next one starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Itinerary {
    legs: Vec<Leg>,
}

impl Itinerary {
    /// Constructs an itinerary, validating leg order.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_engine::domain::{Itinerary, Leg, Ride, RouteId, ServiceTime, StopId, TripId};
    ///
    /// let t = |s| ServiceTime::parse(s).unwrap();
    /// let stop = |s| StopId::parse(s).unwrap();
    ///
    /// let first = Ride::new(
    ///     TripId::parse("T1").unwrap(),
    ///     RouteId::parse("R1").unwrap(),
    ///     (stop("A"), t("08:00")),
    ///     (stop("B"), t("08:15")),
    /// )
    /// .unwrap();
    /// let second = Ride::new(
    ///     TripId::parse("T2").unwrap(),
    ///     RouteId::parse("R2").unwrap(),
    ///     (stop("B"), t("08:20")),
    ///     (stop("C"), t("08:35")),
    /// )
    /// .unwrap();
    ///
    /// let itinerary = Itinerary::new(vec![Leg::Ride(first), Leg::Ride(second)]).unwrap();
    /// assert_eq!(itinerary.transfer_count(), 1);
    /// assert_eq!(itinerary.arrival_time().to_string(), "08:35");
    /// ```
    pub fn new(legs: Vec<Leg>) -> Result<Self, DomainError> {
        if legs.is_empty() {
            return Err(DomainError::EmptyItinerary);
        }

        for window in legs.windows(2) {
            let (prev, next) = (&window[0], &window[1]);
            if prev.end_stop() != next.start_stop() {
                return Err(DomainError::LegsNotConnected(
                    prev.end_stop().clone(),
                    next.start_stop().clone(),
                ));
            }
            if next.start_time() < prev.end_time() {
                return Err(DomainError::LegsOverlap {
                    stop: next.start_stop().clone(),
                    start: next.start_time(),
                    end: prev.end_time(),
                });
            }
        }

        Ok(Itinerary { legs })
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Returns the rides in order.
    pub fn rides(&self) -> impl Iterator<Item = &Ride> {
        self.legs.iter().filter_map(|l| l.as_ride())
    }

    /// Returns the walking transfers in order.
    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.legs.iter().filter_map(|l| l.as_transfer())
    }

    pub fn ride_count(&self) -> usize {
        self.rides().count()
    }

    /// Number of changes between vehicles (rides - 1, or 0 for direct).
    pub fn transfer_count(&self) -> usize {
        self.ride_count().saturating_sub(1)
    }

    pub fn origin(&self) -> &StopId {
        // Non-empty by construction
        self.legs[0].start_stop()
    }

    pub fn destination(&self) -> &StopId {
        self.legs[self.legs.len() - 1].end_stop()
    }

    pub fn departure_time(&self) -> ServiceTime {
        self.legs[0].start_time()
    }

    pub fn arrival_time(&self) -> ServiceTime {
        self.legs[self.legs.len() - 1].end_time()
    }

    pub fn duration_secs(&self) -> u32 {
        self.arrival_time().as_secs() - self.departure_time().as_secs()
    }

    pub fn walk_secs(&self) -> u32 {
        self.transfers().map(|t| t.duration_secs).sum()
    }

    /// Returns true if `self` is at least as good as `other` on both
    /// arrival time and transfer count.
    pub fn covers(&self, other: &Itinerary) -> bool {
        self.arrival_time() <= other.arrival_time()
            && self.transfer_count() <= other.transfer_count()
    }

    /// Returns true if `self` covers `other` and is strictly better on at
    /// least one criterion.
    pub fn dominates(&self, other: &Itinerary) -> bool {
        self.covers(other)
            && (self.arrival_time() < other.arrival_time()
                || self.transfer_count() < other.transfer_count())
    }
}
