//! Scenario tests for the round-based search.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use super::*;
use crate::domain::{Itinerary, Leg, ServiceTime};
use crate::network::NetworkModel;
use crate::network::testing::{SnapshotBuilder, stop_id, time, trip_id};
use crate::realtime::{RealtimeConfig, RealtimeOverlay, RealtimeUpdate};
use crate::transfers::{TransferConfig, TransferResolver};

struct Fixture {
    model: Arc<NetworkModel>,
    transfers: TransferResolver,
    config: SearchConfig,
}

impl Fixture {
    fn new(builder: SnapshotBuilder) -> Self {
        Self::with_config(builder, SearchConfig::default())
    }

    fn with_config(builder: SnapshotBuilder, config: SearchConfig) -> Self {
        let model = Arc::new(builder.model());
        let transfers = TransferResolver::new(model.clone(), &TransferConfig::default());
        Self {
            model,
            transfers,
            config,
        }
    }

    fn planner(&self) -> Planner<'_> {
        Planner::new(&self.model, &self.transfers, &self.config)
    }

    fn search(&self, query: &Query) -> Result<SearchResult, SearchError> {
        self.planner().search(query, &CancelToken::new())
    }
}

/// Stops far enough apart that nobody walks between them.
fn stops() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .stop("A", 51.50, -0.10)
        .stop("B", 51.55, -0.10)
        .stop("C", 51.60, -0.10)
}

/// Route 1 A 08:00 -> B 08:15, Route 2 B 08:20 -> C 08:35, B dwell 3 min.
fn scenario() -> SnapshotBuilder {
    stops()
        .trip("T1", "R1", &[("A", "08:00"), ("B", "08:15")])
        .trip("T2", "R2", &[("B", "08:20"), ("C", "08:35")])
        .dwell("B", 180)
}

/// The scenario plus later departures on both routes.
fn busier() -> SnapshotBuilder {
    scenario()
        .trip("T1b", "R1", &[("A", "08:30"), ("B", "08:45")])
        .trip("T2b", "R2", &[("B", "08:50"), ("C", "09:05")])
}

fn ride_trips(itinerary: &Itinerary) -> Vec<&str> {
    itinerary.rides().map(|r| r.trip.as_str()).collect()
}

fn a_to_c(at: &str) -> Query {
    Query::depart_after(stop_id("A"), stop_id("C"), time(at))
}

#[test]
fn one_transfer_journey() {
    let fixture = Fixture::new(scenario());
    let result = fixture.search(&a_to_c("07:50")).unwrap();

    assert_eq!(result.itineraries.len(), 1);
    let itinerary = &result.itineraries[0];
    assert_eq!(ride_trips(itinerary), vec!["T1", "T2"]);
    assert_eq!(itinerary.transfer_count(), 1);
    assert_eq!(itinerary.departure_time(), time("08:00"));
    assert_eq!(itinerary.arrival_time(), time("08:35"));

    let rides: Vec<_> = itinerary.rides().collect();
    assert_eq!(rides[0].board_stop, stop_id("A"));
    assert_eq!(rides[0].alight_stop, stop_id("B"));
    assert_eq!(rides[0].alight_time, time("08:15"));
    assert_eq!(rides[1].board_time, time("08:20"));
    assert_eq!(result.recommended, Some(0));
}

#[test]
fn zero_transfer_bound_finds_nothing() {
    let fixture = Fixture::new(scenario());
    let err = fixture
        .search(&a_to_c("07:50").with_max_transfers(0))
        .unwrap_err();
    assert!(matches!(err, SearchError::NoRouteFound { max_transfers: 0, .. }));
}

#[test]
fn departure_after_last_trip_finds_nothing() {
    let fixture = Fixture::new(scenario());
    assert!(matches!(
        fixture.search(&a_to_c("08:01")),
        Err(SearchError::NoRouteFound { .. })
    ));
}

#[test]
fn dwell_time_is_respected() {
    let fixture = Fixture::new(busier().dwell("B", 600));
    let result = fixture.search(&a_to_c("07:50")).unwrap();

    // 08:15 + 10 min misses the 08:20
    let itinerary = &result.itineraries[0];
    assert_eq!(ride_trips(itinerary), vec!["T1", "T2b"]);
    assert_eq!(itinerary.arrival_time(), time("09:05"));
}

#[test]
fn default_dwell_applies_without_rule() {
    // 08:15 arrival + 2 min default is fine for 08:17, not for 08:16
    let tight = stops()
        .trip("T1", "R1", &[("A", "08:00"), ("B", "08:15")])
        .trip("T2", "R2", &[("B", "08:16"), ("C", "08:30")])
        .trip("T3", "R3", &[("B", "08:17"), ("C", "08:40")]);
    let fixture = Fixture::new(tight);

    let result = fixture.search(&a_to_c("07:50")).unwrap();
    assert_eq!(ride_trips(&result.itineraries[0]), vec!["T1", "T3"]);
}

#[test]
fn change_not_possible_at_stop() {
    let fixture = Fixture::new(busier().not_possible("B", "B"));
    assert!(matches!(
        fixture.search(&a_to_c("07:50")),
        Err(SearchError::NoRouteFound { .. })
    ));

    // Travelling to B itself is still fine
    let query = Query::depart_after(stop_id("A"), stop_id("B"), time("07:50"));
    assert!(fixture.search(&query).is_ok());
}

#[test]
fn pareto_set_keeps_slower_direct_option() {
    let fixture = Fixture::new(scenario().trip("T4", "R3", &[("A", "08:05"), ("C", "08:50")]));
    let result = fixture.search(&a_to_c("07:50")).unwrap();

    assert_eq!(result.itineraries.len(), 2);
    assert_eq!(result.itineraries[0].arrival_time(), time("08:35"));
    assert_eq!(result.itineraries[0].transfer_count(), 1);
    assert_eq!(result.itineraries[1].arrival_time(), time("08:50"));
    assert_eq!(result.itineraries[1].transfer_count(), 0);
    assert_eq!(result.recommended, Some(0));

    let mut config = SearchConfig::default();
    config.preferred_max_transfers = 0;
    let fixture = Fixture::with_config(
        scenario().trip("T4", "R3", &[("A", "08:05"), ("C", "08:50")]),
        config,
    );
    let result = fixture.search(&a_to_c("07:50")).unwrap();
    assert_eq!(result.recommended, Some(1));
    assert_eq!(
        ride_trips(result.recommended_itinerary().unwrap()),
        vec!["T4"]
    );
}

#[test]
fn faster_direct_dominates_transfer() {
    let fixture = Fixture::new(scenario().trip("T4", "R3", &[("A", "08:05"), ("C", "08:30")]));
    let result = fixture.search(&a_to_c("07:50")).unwrap();

    assert_eq!(result.itineraries.len(), 1);
    assert_eq!(ride_trips(&result.itineraries[0]), vec!["T4"]);
}

#[test]
fn equal_departures_break_ties_by_trip_id() {
    let fixture = Fixture::new(
        stops()
            .trip("T9", "R1", &[("A", "08:00"), ("B", "08:15")])
            .trip("T10", "R1", &[("A", "08:00"), ("B", "08:15")]),
    );
    let query = Query::depart_after(stop_id("A"), stop_id("B"), time("07:00"));
    let result = fixture.search(&query).unwrap();
    assert_eq!(ride_trips(&result.itineraries[0]), vec!["T10"]);
}

#[test]
fn stays_on_board_through_intermediate_stops() {
    let fixture = Fixture::new(
        stops().trip("T1", "R1", &[("A", "08:00"), ("B", "08:15"), ("C", "08:30")]),
    );
    let result = fixture.search(&a_to_c("07:00")).unwrap();
    let itinerary = &result.itineraries[0];
    assert_eq!(itinerary.legs().len(), 1);
    assert_eq!(itinerary.arrival_time(), time("08:30"));
}

#[test]
fn walking_transfer_between_nearby_stops() {
    // B2 is ~220 m from B
    let fixture = Fixture::new(
        stops()
            .stop("B2", 51.552, -0.10)
            .trip("T1", "R1", &[("A", "08:00"), ("B", "08:15")])
            .trip("T3", "R3", &[("B2", "08:25"), ("C", "08:40")]),
    );
    let result = fixture.search(&a_to_c("07:50")).unwrap();
    let itinerary = &result.itineraries[0];

    assert_eq!(itinerary.legs().len(), 3);
    assert_eq!(itinerary.transfer_count(), 1);
    let walk = itinerary.legs()[1].as_transfer().unwrap();
    assert_eq!(walk.from, stop_id("B"));
    assert_eq!(walk.to, stop_id("B2"));
    assert_eq!(walk.departure, time("08:15"));
    assert!((160..=180).contains(&walk.duration_secs), "{}", walk.duration_secs);
    assert_eq!(itinerary.arrival_time(), time("08:40"));
}

#[test]
fn short_walk_still_takes_minimum_transfer_time() {
    // ~45 m apart: the walk is padded to the 2 minute minimum
    let fixture = Fixture::new(
        stops()
            .stop("B2", 51.5504, -0.10)
            .trip("T1", "R1", &[("A", "08:00"), ("B", "08:15")])
            .trip("T3", "R3", &[("B2", "08:16"), ("C", "08:30")])
            .trip("T4", "R3", &[("B2", "08:18"), ("C", "08:32")]),
    );
    let result = fixture.search(&a_to_c("07:50")).unwrap();
    let itinerary = &result.itineraries[0];

    assert_eq!(itinerary.legs()[1].as_transfer().unwrap().duration_secs, 120);
    assert_eq!(ride_trips(itinerary), vec!["T1", "T4"]);
}

#[test]
fn walk_only_itinerary() {
    let fixture = Fixture::new(
        SnapshotBuilder::new()
            .stop("X", 52.000, 0.0)
            .stop("Y", 52.002, 0.0),
    );
    let query = Query::depart_after(stop_id("X"), stop_id("Y"), time("08:00"));
    let result = fixture.search(&query).unwrap();

    let itinerary = &result.itineraries[0];
    assert_eq!(itinerary.ride_count(), 0);
    assert_eq!(itinerary.transfer_count(), 0);
    assert_eq!(itinerary.departure_time(), time("08:00"));
    assert!(itinerary.arrival_time() > time("08:02"));
}

#[test]
fn walk_from_origin_to_boarding_stop() {
    let fixture = Fixture::new(
        stops()
            .stop("A0", 51.498, -0.10)
            .trip("T1", "R1", &[("A", "08:00"), ("C", "08:30")]),
    );
    let query = Query::depart_after(stop_id("A0"), stop_id("C"), time("07:55"));
    let result = fixture.search(&query).unwrap();
    let itinerary = &result.itineraries[0];

    assert!(itinerary.legs()[0].as_transfer().is_some());
    assert_eq!(ride_trips(itinerary), vec!["T1"]);
    assert_eq!(itinerary.transfer_count(), 0);
}

#[test]
fn multiple_destinations_use_best() {
    let fixture = Fixture::new(scenario());
    let query = Query {
        origins: vec![stop_id("A")],
        destinations: vec![stop_id("C"), stop_id("B")],
        time: TimeReference::DepartAfter(time("07:50")),
        max_transfers: None,
    };
    let result = fixture.search(&query).unwrap();

    assert_eq!(result.itineraries.len(), 1);
    assert_eq!(result.itineraries[0].destination(), &stop_id("B"));
}

#[test]
fn multiple_origins() {
    let fixture = Fixture::new(scenario());
    let query = Query {
        origins: vec![stop_id("A"), stop_id("B")],
        destinations: vec![stop_id("C")],
        time: TimeReference::DepartAfter(time("08:10")),
        max_transfers: None,
    };
    let result = fixture.search(&query).unwrap();
    assert_eq!(result.itineraries[0].origin(), &stop_id("B"));
    assert_eq!(result.itineraries[0].transfer_count(), 0);
}

#[test]
fn invalid_queries_rejected() {
    let fixture = Fixture::new(scenario());
    let unknown = Query::depart_after(stop_id("A"), stop_id("NOPE"), time("08:00"));
    assert!(matches!(
        fixture.search(&unknown),
        Err(SearchError::InvalidQuery(_))
    ));

    let same = Query::depart_after(stop_id("A"), stop_id("A"), time("08:00"));
    assert!(matches!(
        fixture.search(&same),
        Err(SearchError::InvalidQuery(_))
    ));
}

#[test]
fn cancelled_search_stops() {
    let fixture = Fixture::new(scenario());
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = fixture.planner().search(&a_to_c("07:50"), &cancel);
    assert_eq!(result.unwrap_err(), SearchError::Cancelled);
}

#[test]
fn realtime_delay_moves_to_next_trip() {
    let fixture = Fixture::new(busier());
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    let now = Utc::now();
    // T1 reaches B at 08:25: too late for the 08:20
    overlay.apply(RealtimeUpdate::delay(trip_id("T1"), stop_id("B"), 600, now));

    let result = fixture
        .planner()
        .with_overlay(&overlay, now)
        .search(&a_to_c("07:50"), &CancelToken::new())
        .unwrap();
    let itinerary = &result.itineraries[0];
    assert_eq!(ride_trips(itinerary), vec!["T1", "T2b"]);
    assert_eq!(itinerary.rides().next().unwrap().alight_time, time("08:25"));
    assert_eq!(itinerary.arrival_time(), time("09:05"));
}

#[test]
fn realtime_delay_without_alternative_finds_nothing() {
    let fixture = Fixture::new(scenario());
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    let now = Utc::now();
    overlay.apply(RealtimeUpdate::delay(trip_id("T1"), stop_id("B"), 600, now));

    let result = fixture
        .planner()
        .with_overlay(&overlay, now)
        .search(&a_to_c("07:50"), &CancelToken::new());
    assert!(matches!(result, Err(SearchError::NoRouteFound { .. })));
}

#[test]
fn stale_realtime_falls_back_to_schedule() {
    let fixture = Fixture::new(scenario());
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    let now = Utc::now();
    overlay.apply(RealtimeUpdate::delay(
        trip_id("T1"),
        stop_id("B"),
        600,
        now - Duration::hours(1),
    ));

    let result = fixture
        .planner()
        .with_overlay(&overlay, now)
        .search(&a_to_c("07:50"), &CancelToken::new())
        .unwrap();
    assert_eq!(result.itineraries[0].arrival_time(), time("08:35"));
}

#[test]
fn cancelled_call_cannot_be_boarded() {
    let fixture = Fixture::new(busier());
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    let now = Utc::now();
    overlay.apply(RealtimeUpdate::cancellation(trip_id("T2"), stop_id("B"), now));

    let result = fixture
        .planner()
        .with_overlay(&overlay, now)
        .search(&a_to_c("07:50"), &CancelToken::new())
        .unwrap();
    assert_eq!(ride_trips(&result.itineraries[0]), vec!["T1", "T2b"]);
}

/// A -> B twice: T1 08:00 -> 08:20, T1b 08:10 -> 08:30.
fn two_runs() -> SnapshotBuilder {
    stops()
        .trip("T1", "R1", &[("A", "08:00"), ("B", "08:20")])
        .trip("T1b", "R1", &[("A", "08:10"), ("B", "08:30")])
}

fn a_to_b_with(
    fixture: &Fixture,
    overlay: &RealtimeOverlay,
    now: DateTime<Utc>,
) -> Vec<(String, ServiceTime)> {
    let query = Query::depart_after(stop_id("A"), stop_id("B"), time("07:50"));
    let result = fixture
        .planner()
        .with_overlay(overlay, now)
        .search(&query, &CancelToken::new())
        .unwrap();
    result
        .itineraries
        .iter()
        .map(|i| (ride_trips(i).join("+"), i.arrival_time()))
        .collect()
}

#[test]
fn earlier_trip_cancelled_downstream_uses_next() {
    let fixture = Fixture::new(two_runs());
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    let now = Utc::now();
    overlay.apply(RealtimeUpdate::cancellation(trip_id("T1"), stop_id("B"), now));

    assert_eq!(
        a_to_b_with(&fixture, &overlay, now),
        vec![("T1b".to_string(), time("08:30"))]
    );
}

#[test]
fn delayed_trip_overtaken_by_later_one() {
    let fixture = Fixture::new(two_runs());
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    let now = Utc::now();
    overlay.apply(RealtimeUpdate::delay(trip_id("T1"), stop_id("B"), 1800, now));

    assert_eq!(
        a_to_b_with(&fixture, &overlay, now),
        vec![("T1b".to_string(), time("08:30"))]
    );
}

#[test]
fn scheduled_overtake_finds_faster_trip() {
    let fixture = Fixture::new(
        stops()
            .trip("slow", "R1", &[("A", "08:00"), ("B", "09:00")])
            .trip("fast", "R1", &[("A", "08:05"), ("B", "08:30")]),
    );
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());

    assert_eq!(
        a_to_b_with(&fixture, &overlay, Utc::now()),
        vec![("fast".to_string(), time("08:30"))]
    );
}

#[test]
fn delayed_trip_still_carries_on_time_calls() {
    // T1 is late only at C, so A -> B is unaffected and A -> C takes T1b
    let fixture = Fixture::new(
        stops()
            .trip("T1", "R1", &[("A", "08:00"), ("B", "08:10"), ("C", "08:20")])
            .trip("T1b", "R1", &[("A", "08:05"), ("B", "08:15"), ("C", "08:25")]),
    );
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    let now = Utc::now();
    overlay.apply(RealtimeUpdate::delay(trip_id("T1"), stop_id("C"), 900, now));

    assert_eq!(
        a_to_b_with(&fixture, &overlay, now),
        vec![("T1".to_string(), time("08:10"))]
    );
    let result = fixture
        .planner()
        .with_overlay(&overlay, now)
        .search(&a_to_c("07:50"), &CancelToken::new())
        .unwrap();
    assert_eq!(ride_trips(&result.itineraries[0]), vec!["T1b"]);
    assert_eq!(result.itineraries[0].arrival_time(), time("08:25"));
}

#[test]
fn arrive_by_picks_latest_departure() {
    let fixture = Fixture::new(busier());

    let result = fixture
        .search(&Query::arrive_by(stop_id("A"), stop_id("C"), time("09:10")))
        .unwrap();
    let itinerary = &result.itineraries[0];
    assert_eq!(itinerary.departure_time(), time("08:30"));
    assert_eq!(itinerary.arrival_time(), time("09:05"));

    let result = fixture
        .search(&Query::arrive_by(stop_id("A"), stop_id("C"), time("08:40")))
        .unwrap();
    assert_eq!(result.itineraries[0].departure_time(), time("08:00"));
    assert!(result.itineraries[0].arrival_time() <= time("08:40"));
}

#[test]
fn arrive_by_too_early_finds_nothing() {
    let fixture = Fixture::new(busier());
    let result = fixture.search(&Query::arrive_by(stop_id("A"), stop_id("C"), time("08:30")));
    assert!(matches!(result, Err(SearchError::NoRouteFound { .. })));
}

#[test]
fn results_are_truncated() {
    let mut config = SearchConfig::default();
    config.max_results = 1;
    let fixture = Fixture::with_config(
        scenario().trip("T4", "R3", &[("A", "08:05"), ("C", "08:50")]),
        config,
    );
    let result = fixture.search(&a_to_c("07:50")).unwrap();
    assert_eq!(result.itineraries.len(), 1);
    assert_eq!(result.itineraries[0].arrival_time(), time("08:35"));
}

// ========== properties over random line networks ==========

const LINE_STOPS: usize = 6;

fn fmt_mins(m: u32) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Trips along a line of distant stops: (from, to, departure mins, mins per hop).
fn line_network(trips: &[(usize, usize, u32, u32)]) -> SnapshotBuilder {
    let mut builder = SnapshotBuilder::new();
    for i in 0..LINE_STOPS {
        builder = builder.stop(&format!("S{i}"), 51.0 + i as f64 * 0.05, 0.0);
    }
    for (n, &(from, to, dep, hop)) in trips.iter().enumerate() {
        if from == to {
            continue;
        }
        let path: Vec<usize> = if from < to {
            (from..=to).collect()
        } else {
            (to..=from).rev().collect()
        };
        let calls: Vec<(String, String)> = path
            .iter()
            .enumerate()
            .map(|(k, s)| (format!("S{s}"), fmt_mins(dep + k as u32 * hop)))
            .collect();
        let calls: Vec<(&str, &str)> = calls
            .iter()
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();
        builder = builder.trip(&format!("T{n}"), &format!("R{from}{to}"), &calls);
    }
    builder
}

fn check_itinerary(itinerary: &Itinerary, query: &Query, min_transfer_secs: u32) {
    assert_eq!(itinerary.origin(), &query.origins[0]);
    assert_eq!(itinerary.destination(), &query.destinations[0]);
    assert!(itinerary.departure_time() >= query.time.time());

    for pair in itinerary.legs().windows(2) {
        assert_eq!(pair[0].end_stop(), pair[1].start_stop());
        assert!(pair[0].end_time() <= pair[1].start_time());
        match (&pair[0], &pair[1]) {
            (Leg::Ride(a), Leg::Ride(b)) => {
                assert!(b.board_time.secs_since(a.alight_time) >= i64::from(min_transfer_secs));
            }
            (Leg::Ride(_), Leg::Transfer(t)) => assert!(t.duration_secs >= min_transfer_secs),
            _ => {}
        }
    }
}

proptest! {
    #[test]
    fn itineraries_are_consistent_and_pareto(
        trips in prop::collection::vec((0..LINE_STOPS, 0..LINE_STOPS, 360u32..600, 2u32..15), 1..25),
        origin in 0..LINE_STOPS,
        destination in 0..LINE_STOPS,
        departure in 330u32..600,
        max_transfers in 0usize..3,
    ) {
        prop_assume!(origin != destination);
        let fixture = Fixture::new(line_network(&trips));
        let query = Query::depart_after(
            stop_id(&format!("S{origin}")),
            stop_id(&format!("S{destination}")),
            time(&fmt_mins(departure)),
        )
        .with_max_transfers(max_transfers);

        match fixture.search(&query) {
            Ok(result) => {
                prop_assert!(!result.itineraries.is_empty());
                prop_assert!(result.recommended.is_some());
                for itinerary in &result.itineraries {
                    check_itinerary(itinerary, &query, fixture.config.min_transfer_secs);
                    prop_assert!(itinerary.transfer_count() <= max_transfers);
                }
                for (i, a) in result.itineraries.iter().enumerate() {
                    for (j, b) in result.itineraries.iter().enumerate() {
                        prop_assert!(i == j || !a.covers(b), "{} covers {}", i, j);
                    }
                }
            }
            Err(SearchError::NoRouteFound { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn more_transfers_never_arrive_later(
        trips in prop::collection::vec((0..LINE_STOPS, 0..LINE_STOPS, 360u32..600, 2u32..15), 1..25),
        origin in 0..LINE_STOPS,
        destination in 0..LINE_STOPS,
        departure in 330u32..600,
    ) {
        prop_assume!(origin != destination);
        let fixture = Fixture::new(line_network(&trips));
        let best = |max_transfers: usize| {
            let query = Query::depart_after(
                stop_id(&format!("S{origin}")),
                stop_id(&format!("S{destination}")),
                time(&fmt_mins(departure)),
            )
            .with_max_transfers(max_transfers);
            fixture
                .search(&query)
                .ok()
                .and_then(|r| r.itineraries.first().map(Itinerary::arrival_time))
        };

        let tight = best(0);
        let loose = best(2);
        if let Some(tight) = tight {
            prop_assert!(loose.is_some_and(|loose| loose <= tight));
        }
    }
}

// ========== optimality against exhaustive enumeration ==========

/// Random realtime changes: (trip number, stop, delay mins, cancelled).
fn overlay_from(changes: &[(usize, usize, i32, bool)], now: DateTime<Utc>) -> RealtimeOverlay {
    let overlay = RealtimeOverlay::new(&RealtimeConfig::default());
    for &(trip, stop, delay_mins, cancelled) in changes {
        let (trip, stop) = (trip_id(&format!("T{trip}")), stop_id(&format!("S{stop}")));
        overlay.apply(if cancelled {
            RealtimeUpdate::cancellation(trip, stop, now)
        } else {
            RealtimeUpdate::delay(trip, stop, delay_mins * 60, now)
        });
    }
    overlay
}

/// Pareto front of (arrival, transfers) found by trying every trip from
/// every reachable stop, one more ride per pass.
fn exhaustive_front(
    fixture: &Fixture,
    times: &EffectiveTimes,
    query: &Query,
    max_rides: usize,
) -> Vec<(ServiceTime, usize)> {
    let model = &fixture.model;
    let origin = model.stop_idx(&query.origins[0]).unwrap();
    let destination = model.stop_idx(&query.destinations[0]).unwrap();
    let departure = query.time.time();

    let mut best = vec![ServiceTime::NEVER; model.stops().len()];
    let mut front = Vec::new();
    for rides in 1..=max_rides {
        let ready: Vec<ServiceTime> = (0..best.len())
            .map(|s| {
                if s == origin.0 {
                    departure
                } else if best[s].is_never() {
                    ServiceTime::NEVER
                } else {
                    best[s].plus_secs(fixture.config.min_transfer_secs)
                }
            })
            .collect();

        let mut next = best.clone();
        for (t, trip) in model.trips().iter().enumerate() {
            let trip_idx = crate::network::TripIdx(t);
            let calls = trip.stop_times().len();
            for board in 0..calls - 1 {
                let stop = model.stop_idx(&trip.stop_times()[board].stop).unwrap();
                let call = times.call(model, trip_idx, board);
                if call.cancelled || ready[stop.0].is_never() || call.departure < ready[stop.0] {
                    continue;
                }
                for alight in board + 1..calls {
                    let call = times.call(model, trip_idx, alight);
                    let stop = model.stop_idx(&trip.stop_times()[alight].stop).unwrap();
                    if !call.cancelled && call.arrival < next[stop.0] {
                        next[stop.0] = call.arrival;
                    }
                }
            }
        }
        best = next;

        let arrival = best[destination.0];
        if !arrival.is_never() && front.last().is_none_or(|&(a, _)| arrival < a) {
            front.push((arrival, rides - 1));
        }
    }
    front.sort();
    front
}

proptest! {
    #[test]
    fn matches_exhaustive_search_under_realtime(
        trips in prop::collection::vec((0..LINE_STOPS, 0..LINE_STOPS, 360u32..600, 2u32..15), 1..25),
        changes in prop::collection::vec((0usize..25, 0..LINE_STOPS, -3i32..30, any::<bool>()), 0..8),
        origin in 0..LINE_STOPS,
        destination in 0..LINE_STOPS,
        departure in 330u32..600,
        max_transfers in 0usize..3,
    ) {
        prop_assume!(origin != destination);
        let fixture = Fixture::new(line_network(&trips));
        let now = Utc::now();
        let overlay = overlay_from(&changes, now);
        let query = Query::depart_after(
            stop_id(&format!("S{origin}")),
            stop_id(&format!("S{destination}")),
            time(&fmt_mins(departure)),
        )
        .with_max_transfers(max_transfers);

        let times = EffectiveTimes::capture(&fixture.model, &overlay, now);
        let expected = exhaustive_front(&fixture, &times, &query, max_transfers + 1);

        let found = fixture
            .planner()
            .with_overlay(&overlay, now)
            .search(&query, &CancelToken::new());
        match found {
            Ok(result) => {
                let mut front: Vec<_> = result
                    .itineraries
                    .iter()
                    .map(|i| (i.arrival_time(), i.transfer_count()))
                    .collect();
                front.sort();
                prop_assert_eq!(front, expected);
            }
            Err(SearchError::NoRouteFound { .. }) => prop_assert!(expected.is_empty(), "missed {:?}", expected),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn delays_never_speed_up_journeys(
        trips in prop::collection::vec((0..LINE_STOPS, 0..LINE_STOPS, 360u32..600, 2u32..15), 1..25),
        delayed in 0usize..25,
        stop in 0..LINE_STOPS,
        delay_mins in 0i32..40,
        origin in 0..LINE_STOPS,
        destination in 0..LINE_STOPS,
        departure in 330u32..600,
    ) {
        prop_assume!(origin != destination);
        let fixture = Fixture::new(line_network(&trips));
        let query = Query::depart_after(
            stop_id(&format!("S{origin}")),
            stop_id(&format!("S{destination}")),
            time(&fmt_mins(departure)),
        );
        let before = match fixture.search(&query) {
            Ok(result) => result.itineraries,
            Err(_) => Vec::new(),
        };

        let now = Utc::now();
        let overlay = overlay_from(&[(delayed, stop, delay_mins, false)], now);
        let after = fixture
            .planner()
            .with_overlay(&overlay, now)
            .search(&query, &CancelToken::new())
            .map(|r| r.itineraries)
            .unwrap_or_default();

        // Catching the delayed trip where it now leaves later can make a
        // connection that did not exist; every other itinerary existed
        // before the delay with an arrival no earlier.
        let delayed_id = trip_id(&format!("T{delayed}"));
        let boards_late = |itinerary: &Itinerary| {
            itinerary.rides().any(|r| {
                r.trip == delayed_id
                    && fixture
                        .model
                        .trip_by_id(&r.trip)
                        .and_then(|t| t.stop_times().iter().find(|st| st.stop == r.board_stop))
                        .is_some_and(|st| st.departure != r.board_time)
            })
        };
        for itinerary in after.iter().filter(|i| !boards_late(*i)) {
            let undelayed = before
                .iter()
                .filter(|b| b.transfer_count() <= itinerary.transfer_count())
                .map(Itinerary::arrival_time)
                .min();
            prop_assert!(
                undelayed.is_some_and(|a| a <= itinerary.arrival_time()),
                "{:?} arrives at {} ahead of {:?}",
                ride_trips(itinerary),
                itinerary.arrival_time(),
                undelayed
            );
        }
    }
}
