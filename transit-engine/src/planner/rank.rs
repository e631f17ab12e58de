//! Itinerary ranking for search results.
//!
//! Results are a Pareto set over (arrival time, transfer count), ordered so
//! the most useful options come first.

use std::cmp::{Ordering, Reverse};

use crate::domain::Itinerary;

/// Ordering used for presentation.
///
/// 1. Arrival time (earlier is better)
/// 2. Number of transfers (fewer is better)
/// 3. Departure time (later is better, less waiting)
/// 4. Walking time (less is better)
fn compare(a: &Itinerary, b: &Itinerary) -> Ordering {
    (
        a.arrival_time(),
        a.transfer_count(),
        Reverse(a.departure_time()),
        a.walk_secs(),
    )
        .cmp(&(
            b.arrival_time(),
            b.transfer_count(),
            Reverse(b.departure_time()),
            b.walk_secs(),
        ))
}

/// Rank itineraries by preference, best first.
pub fn rank_itineraries(mut itineraries: Vec<Itinerary>) -> Vec<Itinerary> {
    itineraries.sort_by(compare);
    itineraries
}

/// Remove dominated itineraries.
///
/// An itinerary is dominated if another arrives no later with no more
/// transfers, and is strictly better on one of the two. Of several
/// itineraries with the same arrival and transfer count only the best
/// ranked is kept, so the result never holds two equivalent options.
pub fn remove_dominated(itineraries: Vec<Itinerary>) -> Vec<Itinerary> {
    let ranked = rank_itineraries(itineraries);

    let mut result: Vec<Itinerary> = Vec::with_capacity(ranked.len());
    for itinerary in ranked {
        // Sorted by arrival, so only fewer transfers can earn a place
        let fewest = result.last().map(Itinerary::transfer_count);
        if fewest.is_none_or(|fewest| itinerary.transfer_count() < fewest) {
            result.push(itinerary);
        }
    }
    result
}

/// Index of the recommended itinerary in a ranked list.
///
/// The earliest arrival among itineraries with at most `preferred_max`
/// transfers, or the earliest arrival overall if none qualify.
pub fn recommend(itineraries: &[Itinerary], preferred_max: usize) -> Option<usize> {
    best_of(
        itineraries
            .iter()
            .enumerate()
            .filter(|(_, i)| i.transfer_count() <= preferred_max),
    )
    .or_else(|| best_of(itineraries.iter().enumerate()))
}

fn best_of<'a>(candidates: impl Iterator<Item = (usize, &'a Itinerary)>) -> Option<usize> {
    candidates
        .min_by(|(_, a), (_, b)| compare(a, b))
        .map(|(i, _)| i)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Leg, RouteId, Ride, ServiceTime, StopId, Transfer, TripId};

    fn stop(s: &str) -> StopId {
        StopId::parse(s).unwrap()
    }

    fn mins(m: u32) -> ServiceTime {
        ServiceTime::from_secs(m * 60)
    }

    /// An itinerary from O to Z of `rides` equal rides starting at `dep`
    /// minutes, each `slice` minutes long.
    pub(crate) fn chain(id: u32, dep: u32, slice: u32, rides: u32) -> Itinerary {
        let legs = (0..rides)
            .map(|i| {
                let from = if i == 0 { stop("O") } else { stop(&format!("S{i}")) };
                let to = if i + 1 == rides {
                    stop("Z")
                } else {
                    stop(&format!("S{}", i + 1))
                };
                Leg::Ride(
                    Ride::new(
                        TripId::parse(&format!("T{id}-{i}")).unwrap(),
                        RouteId::parse("R").unwrap(),
                        (from, mins(dep + i * slice)),
                        (to, mins(dep + (i + 1) * slice)),
                    )
                    .unwrap(),
                )
            })
            .collect();
        Itinerary::new(legs).unwrap()
    }

    fn with_walk(dep: u32, ride_mins: u32, walk_secs: u32) -> Itinerary {
        let ride = Ride::new(
            TripId::parse("TW").unwrap(),
            RouteId::parse("R").unwrap(),
            (stop("O"), mins(dep)),
            (stop("Y"), mins(dep + ride_mins)),
        )
        .unwrap();
        let walk = Transfer::new(stop("Y"), stop("Z"), mins(dep + ride_mins), walk_secs);
        Itinerary::new(vec![Leg::Ride(ride), Leg::Transfer(walk)]).unwrap()
    }

    #[test]
    fn rank_by_arrival() {
        let early = chain(1, 480, 30, 1);
        let late = chain(2, 490, 30, 1);

        let ranked = rank_itineraries(vec![late, early]);

        assert_eq!(ranked[0].arrival_time(), mins(510));
        assert_eq!(ranked[1].arrival_time(), mins(520));
    }

    #[test]
    fn rank_by_transfers_when_same_arrival() {
        let direct = chain(1, 480, 60, 1);
        let change = chain(2, 480, 30, 2);

        let ranked = rank_itineraries(vec![change, direct]);

        assert_eq!(ranked[0].transfer_count(), 0);
        assert_eq!(ranked[1].transfer_count(), 1);
    }

    #[test]
    fn rank_prefers_later_departure_then_less_walking() {
        let leave_early = chain(1, 470, 40, 1);
        let leave_late = chain(2, 490, 20, 1);
        let ranked = rank_itineraries(vec![leave_early, leave_late]);
        assert_eq!(ranked[0].departure_time(), mins(490));

        let long_walk = with_walk(480, 20, 600);
        let short_walk = with_walk(480, 25, 300);
        let ranked = rank_itineraries(vec![long_walk, short_walk]);
        assert_eq!(ranked[0].walk_secs(), 300);
    }

    #[test]
    fn remove_dominated_keeps_tradeoffs() {
        // Faster with a change vs slower direct: both survive
        let fast = chain(1, 480, 15, 2);
        let direct = chain(2, 480, 45, 1);
        // Later and with more changes than `fast`: dominated
        let worse = chain(3, 480, 20, 3);

        let result = remove_dominated(vec![worse, direct, fast]);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].arrival_time(), mins(510));
        assert_eq!(result[0].transfer_count(), 1);
        assert_eq!(result[1].transfer_count(), 0);
    }

    #[test]
    fn remove_dominated_collapses_equivalent() {
        let a = chain(1, 480, 30, 1);
        let b = chain(2, 480, 30, 1);
        let result = remove_dominated(vec![a, b]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn remove_dominated_empty() {
        assert!(remove_dominated(Vec::new()).is_empty());
    }

    #[test]
    fn recommend_prefers_few_transfers() {
        let ranked = remove_dominated(vec![
            chain(1, 480, 10, 3), // 08:30, 2 transfers
            chain(2, 480, 20, 2), // 08:40, 1 transfer
            chain(3, 480, 50, 1), // 08:50, direct
        ]);
        assert_eq!(ranked.len(), 3);

        let pick = recommend(&ranked, 1).unwrap();
        assert_eq!(ranked[pick].arrival_time(), mins(520));

        let pick = recommend(&ranked, 0).unwrap();
        assert_eq!(ranked[pick].transfer_count(), 0);
    }

    #[test]
    fn recommend_falls_back_to_earliest() {
        let ranked = vec![chain(1, 480, 10, 3), chain(2, 480, 15, 3)];
        assert_eq!(recommend(&ranked, 1), Some(0));
        assert_eq!(recommend(&[], 1), None);
    }
}
