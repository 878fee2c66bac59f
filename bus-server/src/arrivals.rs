//! Arrival computation.
//!
//! Joins stop_times against trips and the service calendar to answer "which
//! buses leave this stop for that destination next, and in how many
//! minutes". Results are ephemeral: they are valid for the instant they
//! were computed and are never cached.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};

use crate::config::Config;
use crate::gtfs::{ServiceTime, Snapshot};

/// One upcoming departure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Arrival {
    /// Destination text shown on the vehicle.
    pub headsign: String,
    /// Whole minutes until the scheduled departure. Never negative.
    pub minutes: i64,
    /// Scheduled wall-clock time, "HH:MM" (past-midnight times normalized).
    pub scheduled: String,
}

/// Arrivals for one configured route, with its presentation labels.
#[derive(Debug, Clone)]
pub struct RouteArrivals {
    pub key: String,
    pub lametric_key: String,
    pub speech_name: String,
    pub display_name: String,
    pub arrivals: Vec<Arrival>,
}

/// The full board: one entry per configured route.
#[derive(Debug, Clone)]
pub struct Board {
    pub computed_at: NaiveDateTime,
    pub routes: Vec<RouteArrivals>,
}

/// Compute the next departures from `stop_ids` whose headsign matches any
/// of `patterns`.
///
/// Matching is a case-normalized substring test: the pattern "Central"
/// accepts the headsign "Central Station via Park". An unknown stop id
/// contributes nothing; a trip without a calendar entry is excluded. The
/// result is sorted ascending by minutes and truncated to `limit`.
pub fn next_arrivals(
    snapshot: &Snapshot,
    stop_ids: &[String],
    patterns: &[String],
    now: NaiveDateTime,
    limit: usize,
) -> Vec<Arrival> {
    let today = now.date();
    let now_secs = now.time().num_seconds_from_midnight();

    let mut arrivals = Vec::new();
    collect(snapshot, stop_ids, patterns, today, now_secs, &mut arrivals);

    // Past-midnight service: a row written "25:10:00" belongs to the prior
    // service day, so re-evaluate yesterday's services with now shifted a
    // day forward.
    if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
        collect(
            snapshot,
            stop_ids,
            patterns,
            yesterday,
            now_secs + 86_400,
            &mut arrivals,
        );
    }

    arrivals.sort_by_key(|a| a.minutes);
    arrivals.truncate(limit);
    arrivals
}

/// Evaluate every configured route against one snapshot at one instant.
pub fn route_board(snapshot: &Snapshot, config: &Config, now: NaiveDateTime) -> Board {
    let routes = config
        .routes
        .iter()
        .map(|route| {
            let stop_ids = config
                .stop_for(route)
                .map_or(&[][..], |s| s.stop_ids.as_slice());
            let arrivals = next_arrivals(
                snapshot,
                stop_ids,
                config.patterns_for(route),
                now,
                route.limit,
            );
            RouteArrivals {
                key: route.key(),
                lametric_key: route.lametric_key(),
                speech_name: route.speech_name.clone(),
                display_name: route.display_name.clone(),
                arrivals,
            }
        })
        .collect();

    Board {
        computed_at: now,
        routes,
    }
}

fn collect(
    snapshot: &Snapshot,
    stop_ids: &[String],
    patterns: &[String],
    service_date: NaiveDate,
    now_secs: u32,
    out: &mut Vec<Arrival>,
) {
    let now = ServiceTime::from_seconds(now_secs);

    for stop_id in stop_ids {
        for call in snapshot.stop_times_for(stop_id) {
            let Some(trip) = snapshot.trip(&call.trip_id) else {
                continue;
            };

            let active = snapshot
                .calendar_for(&trip.service_id)
                .is_some_and(|c| c.active_on(service_date));
            if !active {
                continue;
            }

            let headsign = if call.headsign.is_empty() {
                trip.headsign.as_str()
            } else {
                call.headsign.as_str()
            };
            if !matches_any(headsign, patterns) {
                continue;
            }

            let minutes = call.departure.minutes_after(now);
            if minutes < 0 {
                continue;
            }

            out.push(Arrival {
                headsign: headsign.to_string(),
                minutes,
                scheduled: call.departure.clock_hhmm(),
            });
        }
    }
}

/// Case-normalized substring match against any pattern.
fn matches_any(headsign: &str, patterns: &[String]) -> bool {
    let headsign = headsign.to_lowercase();
    patterns
        .iter()
        .any(|p| headsign.contains(&p.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;

    // 2024-03-14 is a Thursday.
    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap()
    }

    /// Write a dataset with one weekday service and the given departures
    /// from stop S1, each as (trip_id, departure, headsign).
    fn write_dataset(dir: &Path, departures: &[(&str, &str, &str)]) {
        fs::write(dir.join("stops.txt"), "stop_id,stop_name\nS1,Station Front\n").unwrap();

        let mut trips = String::from("route_id,service_id,trip_id,trip_headsign\n");
        let mut stop_times =
            String::from("trip_id,departure_time,stop_id,stop_sequence,stop_headsign\n");
        for (trip_id, departure, headsign) in departures {
            writeln!(trips, "R1,WEEKDAY,{trip_id},{headsign}").unwrap();
            writeln!(stop_times, "{trip_id},{departure},S1,1,").unwrap();
        }
        fs::write(dir.join("trips.txt"), trips).unwrap();
        fs::write(dir.join("stop_times.txt"), stop_times).unwrap();

        fs::write(
            dir.join("calendar.txt"),
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             WEEKDAY,1,1,1,1,1,0,0,20240101,20241231\n",
        )
        .unwrap();
    }

    fn load(dir: &Path) -> Snapshot {
        Snapshot::load(dir).unwrap()
    }

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn filters_sorts_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(
            dir.path(),
            &[
                ("T45", "07:45:00", "Central Station"),
                ("T03", "07:03:00", "Central Station"),
                ("T10", "07:10:00", "Airport"),
                ("T12", "07:12:00", "Central Station"),
            ],
        );
        let snapshot = load(dir.path());

        let arrivals = next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), now(), 2);
        assert_eq!(arrivals.len(), 2);
        assert_eq!(arrivals[0].minutes, 3);
        assert_eq!(arrivals[0].scheduled, "07:03");
        assert_eq!(arrivals[1].minutes, 12);
    }

    #[test]
    fn unknown_stop_id_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("T1", "07:10:00", "Central Station")]);
        let snapshot = load(dir.path());

        let arrivals = next_arrivals(&snapshot, &s(&["NOPE"]), &s(&["Central"]), now(), 3);
        assert!(arrivals.is_empty());
    }

    #[test]
    fn departed_buses_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(
            dir.path(),
            &[
                ("T1", "06:55:00", "Central Station"),
                ("T2", "07:05:00", "Central Station"),
            ],
        );
        let snapshot = load(dir.path());

        let arrivals = next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), now(), 3);
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].minutes, 5);
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("T1", "07:10:00", "Central Station via Park")]);
        let snapshot = load(dir.path());

        let hit = next_arrivals(&snapshot, &s(&["S1"]), &s(&["central"]), now(), 3);
        assert_eq!(hit.len(), 1);

        let miss = next_arrivals(&snapshot, &s(&["S1"]), &s(&["Harbour"]), now(), 3);
        assert!(miss.is_empty());
    }

    #[test]
    fn inactive_weekday_excludes_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("T1", "07:10:00", "Central Station")]);
        let snapshot = load(dir.path());

        // 2024-03-16 is a Saturday; the WEEKDAY service does not run.
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 16)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        assert!(next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), saturday, 3).is_empty());
    }

    #[test]
    fn removed_exception_excludes_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("T1", "07:10:00", "Central Station")]);
        fs::write(
            dir.path().join("calendar_dates.txt"),
            "service_id,date,exception_type\nWEEKDAY,20240314,2\n",
        )
        .unwrap();
        let snapshot = load(dir.path());

        assert!(next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), now(), 3).is_empty());
    }

    #[test]
    fn added_exception_includes_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("T1", "07:10:00", "Central Station")]);
        // Add service on a Saturday the weekly rule excludes.
        fs::write(
            dir.path().join("calendar_dates.txt"),
            "service_id,date,exception_type\nWEEKDAY,20240316,1\n",
        )
        .unwrap();
        let snapshot = load(dir.path());

        let saturday = NaiveDate::from_ymd_opt(2024, 3, 16)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        let arrivals = next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), saturday, 3);
        assert_eq!(arrivals.len(), 1);
    }

    #[test]
    fn out_of_range_date_excludes_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("T1", "07:10:00", "Central Station")]);
        let snapshot = load(dir.path());

        // A Wednesday, but after end_date.
        let later = NaiveDate::from_ymd_opt(2025, 1, 8)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        assert!(next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), later, 3).is_empty());
    }

    #[test]
    fn missing_calendar_entry_excludes_trip_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(
            dir.path(),
            &[
                ("T1", "07:10:00", "Central Station"),
                ("T2", "07:15:00", "Central Station"),
            ],
        );
        // Rewrite trips so T2 references a service with no calendar entry.
        fs::write(
            dir.path().join("trips.txt"),
            "route_id,service_id,trip_id,trip_headsign\n\
             R1,WEEKDAY,T1,Central Station\n\
             R1,PHANTOM,T2,Central Station\n",
        )
        .unwrap();
        let snapshot = load(dir.path());

        let arrivals = next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), now(), 3);
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].minutes, 10);
    }

    #[test]
    fn past_midnight_service_maps_to_early_morning() {
        let dir = tempfile::tempdir().unwrap();
        // Wednesday's service, written with extended hours.
        write_dataset(dir.path(), &[("T1", "25:10:00", "Central Station")]);
        fs::write(
            dir.path().join("calendar.txt"),
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             WEEKDAY,0,0,1,0,0,0,0,20240101,20241231\n",
        )
        .unwrap();
        let snapshot = load(dir.path());

        // Thursday 00:40: the Wednesday 25:10 run is due at 01:10, in 30
        // minutes.
        let small_hours = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(0, 40, 0)
            .unwrap();
        let arrivals = next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), small_hours, 3);
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].minutes, 30);
        assert_eq!(arrivals[0].scheduled, "01:10");
    }

    #[test]
    fn board_covers_every_configured_route() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(
            dir.path(),
            &[
                ("T1", "07:05:00", "Central Station"),
                ("T2", "07:08:00", "Airport"),
            ],
        );
        let snapshot = load(dir.path());

        let config: Config = toml::from_str(
            r#"
            [gtfs]
            source_url = "https://example.org/gtfs.zip"

            [stops.home]
            name = "Station Front"
            stop_ids = ["S1"]

            [destinations]
            central = ["Central"]
            airport = ["Airport"]

            [[routes]]
            stop = "home"
            destination = "central"
            speech_name = "the bus to Central"
            display_name = "Central"

            [[routes]]
            stop = "home"
            destination = "airport"
            speech_name = "the airport bus"
            display_name = "Airport"
            lametric_key = "airport"
            "#,
        )
        .unwrap();

        let board = route_board(&snapshot, &config, now());
        assert_eq!(board.routes.len(), 2);
        assert_eq!(board.routes[0].key, "home_central");
        assert_eq!(board.routes[0].arrivals[0].minutes, 5);
        assert_eq!(board.routes[1].lametric_key, "airport");
        assert_eq!(board.routes[1].arrivals[0].minutes, 8);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(48))]

            /// Whatever the departures look like, results are ascending,
            /// non-negative and within the limit.
            #[test]
            fn sorted_nonnegative_and_bounded(
                offsets in proptest::collection::vec(-120i64..600, 0..12),
                limit in 0usize..6,
            ) {
                let dir = tempfile::tempdir().unwrap();
                let departures: Vec<(String, String, &str)> = offsets
                    .iter()
                    .enumerate()
                    .map(|(i, mins)| {
                        let total = 7 * 60 + mins; // offset from 07:00
                        let time = format!("{:02}:{:02}:00", total.div_euclid(60), total.rem_euclid(60));
                        (format!("T{i}"), time, "Central Station")
                    })
                    .collect();
                let borrowed: Vec<(&str, &str, &str)> = departures
                    .iter()
                    .map(|(t, d, h)| (t.as_str(), d.as_str(), *h))
                    .collect();
                write_dataset(dir.path(), &borrowed);
                let snapshot = load(dir.path());

                let arrivals = next_arrivals(&snapshot, &s(&["S1"]), &s(&["Central"]), now(), limit);

                prop_assert!(arrivals.len() <= limit);
                prop_assert!(arrivals.iter().all(|a| a.minutes >= 0));
                prop_assert!(arrivals.windows(2).all(|w| w[0].minutes <= w[1].minutes));
            }
        }
    }
}
