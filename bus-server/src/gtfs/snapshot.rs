//! Immutable in-memory GTFS snapshot.
//!
//! `Snapshot::load` parses a dataset directory into keyed tables. A loaded
//! snapshot is never mutated; the update job produces a whole new directory
//! and the server swaps to a freshly loaded snapshot in one step.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::DataError;
use super::records::{
    CalendarDateRecord, CalendarRecord, StopRecord, StopTimeRecord, TripRecord,
};
use super::time::ServiceTime;

/// A stop from stops.txt.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: String,
    pub name: String,
}

/// A trip from trips.txt.
#[derive(Debug, Clone)]
pub struct Trip {
    pub id: String,
    pub route_id: String,
    pub service_id: String,
    pub headsign: String,
}

/// A scheduled call at a stop, from stop_times.txt.
#[derive(Debug, Clone)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    pub departure: ServiceTime,
    pub sequence: u32,
    /// Per-call headsign override; empty when the feed leaves it blank.
    pub headsign: String,
}

/// The weekly base pattern from calendar.txt.
#[derive(Debug, Clone)]
struct WeeklyRule {
    /// Monday-first weekday flags.
    weekdays: [bool; 7],
    start: NaiveDate,
    end: NaiveDate,
}

/// Service validity for one service_id: weekly pattern plus dated exceptions.
///
/// Services that appear only in calendar_dates.txt have no base rule and run
/// exclusively on their added dates.
#[derive(Debug, Clone, Default)]
pub struct CalendarEntry {
    base: Option<WeeklyRule>,
    added: HashSet<NaiveDate>,
    removed: HashSet<NaiveDate>,
}

impl CalendarEntry {
    /// Does this service run on `date`?
    ///
    /// Exception dates override the weekly pattern: a removed date is never
    /// active, an added date always is.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        if self.removed.contains(&date) {
            return false;
        }
        if self.added.contains(&date) {
            return true;
        }
        match &self.base {
            Some(rule) => {
                let weekday = date.weekday().num_days_from_monday() as usize;
                rule.weekdays[weekday] && rule.start <= date && date <= rule.end
            }
            None => false,
        }
    }
}

/// Parsed GTFS tables for one dataset version.
#[derive(Debug, Default)]
pub struct Snapshot {
    stops: HashMap<String, Stop>,
    trips: HashMap<String, Trip>,
    /// stop_id -> calls at that stop, sorted by departure time.
    stop_times: HashMap<String, Vec<StopTime>>,
    calendar: HashMap<String, CalendarEntry>,
    stop_time_count: usize,
    skipped_rows: usize,
}

impl Snapshot {
    /// Load a snapshot from a GTFS dataset directory.
    ///
    /// Requires stops.txt, trips.txt and stop_times.txt, plus at least one
    /// of calendar.txt / calendar_dates.txt. A stop_time row whose departure
    /// time fails to parse is skipped (and counted); a row referencing an
    /// undefined trip fails the whole load.
    pub fn load(dir: &Path) -> Result<Self, DataError> {
        let stop_rows: Vec<StopRecord> = read_required(dir, "stops.txt")?;
        let trip_rows: Vec<TripRecord> = read_required(dir, "trips.txt")?;
        let stop_time_rows: Vec<StopTimeRecord> = read_required(dir, "stop_times.txt")?;
        let calendar_rows: Option<Vec<CalendarRecord>> = read_optional(dir, "calendar.txt")?;
        let calendar_date_rows: Option<Vec<CalendarDateRecord>> =
            read_optional(dir, "calendar_dates.txt")?;

        if calendar_rows.is_none() && calendar_date_rows.is_none() {
            return Err(DataError::NoCalendar);
        }

        let stops: HashMap<String, Stop> = stop_rows
            .into_iter()
            .map(|r| {
                (
                    r.stop_id.clone(),
                    Stop {
                        id: r.stop_id,
                        name: r.stop_name,
                    },
                )
            })
            .collect();

        let trips: HashMap<String, Trip> = trip_rows
            .into_iter()
            .map(|r| {
                (
                    r.trip_id.clone(),
                    Trip {
                        id: r.trip_id,
                        route_id: r.route_id,
                        service_id: r.service_id,
                        headsign: r.trip_headsign,
                    },
                )
            })
            .collect();

        let calendar = build_calendar(calendar_rows, calendar_date_rows)?;

        let mut stop_times: HashMap<String, Vec<StopTime>> = HashMap::new();
        let mut stop_time_count = 0usize;
        let mut skipped_rows = 0usize;
        for row in stop_time_rows {
            if !trips.contains_key(&row.trip_id) {
                return Err(DataError::UnknownTrip(row.trip_id));
            }
            let departure = match ServiceTime::parse(&row.departure_time) {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        trip_id = %row.trip_id,
                        stop_id = %row.stop_id,
                        value = %row.departure_time,
                        "skipping stop_time with unparseable departure: {e}"
                    );
                    skipped_rows += 1;
                    continue;
                }
            };
            stop_time_count += 1;
            stop_times.entry(row.stop_id.clone()).or_default().push(StopTime {
                trip_id: row.trip_id,
                stop_id: row.stop_id,
                departure,
                sequence: row.stop_sequence,
                headsign: row.stop_headsign,
            });
        }
        for calls in stop_times.values_mut() {
            calls.sort_by_key(|st| st.departure);
        }

        debug!(
            stops = stops.len(),
            trips = trips.len(),
            stop_times = stop_time_count,
            services = calendar.len(),
            skipped = skipped_rows,
            "loaded GTFS snapshot"
        );

        Ok(Self {
            stops,
            trips,
            stop_times,
            calendar,
            stop_time_count,
            skipped_rows,
        })
    }

    /// Look up a stop by id.
    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.get(stop_id)
    }

    /// All calls at a stop, sorted by departure time. Unknown stop ids
    /// yield an empty slice.
    pub fn stop_times_for(&self, stop_id: &str) -> &[StopTime] {
        self.stop_times.get(stop_id).map_or(&[], Vec::as_slice)
    }

    /// Look up a trip by id.
    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.trips.get(trip_id)
    }

    /// Resolve several trip ids at once; ids without a trip are omitted.
    pub fn trips_for<'a, I>(&self, trip_ids: I) -> HashMap<&str, &Trip>
    where
        I: IntoIterator<Item = &'a str>,
    {
        trip_ids
            .into_iter()
            .filter_map(|id| self.trips.get(id).map(|t| (t.id.as_str(), t)))
            .collect()
    }

    /// Service validity for a service id.
    pub fn calendar_for(&self, service_id: &str) -> Option<&CalendarEntry> {
        self.calendar.get(service_id)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn stop_time_count(&self) -> usize {
        self.stop_time_count
    }

    pub fn service_count(&self) -> usize {
        self.calendar.len()
    }

    /// Rows dropped during load because their time field did not parse.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

fn build_calendar(
    calendar_rows: Option<Vec<CalendarRecord>>,
    calendar_date_rows: Option<Vec<CalendarDateRecord>>,
) -> Result<HashMap<String, CalendarEntry>, DataError> {
    let mut calendar: HashMap<String, CalendarEntry> = HashMap::new();

    for row in calendar_rows.into_iter().flatten() {
        let start = parse_gtfs_date("calendar.txt", &row.start_date)?;
        let end = parse_gtfs_date("calendar.txt", &row.end_date)?;
        let entry = calendar.entry(row.service_id).or_default();
        entry.base = Some(WeeklyRule {
            weekdays: [
                row.monday != 0,
                row.tuesday != 0,
                row.wednesday != 0,
                row.thursday != 0,
                row.friday != 0,
                row.saturday != 0,
                row.sunday != 0,
            ],
            start,
            end,
        });
    }

    for row in calendar_date_rows.into_iter().flatten() {
        let date = parse_gtfs_date("calendar_dates.txt", &row.date)?;
        let entry = calendar.entry(row.service_id).or_default();
        match row.exception_type {
            2 => {
                entry.removed.insert(date);
            }
            // GTFS defines only 1 and 2; treat anything else as "added",
            // matching feeds that leave the column blank.
            _ => {
                entry.added.insert(date);
            }
        }
    }

    Ok(calendar)
}

/// Parse a GTFS YYYYMMDD date field.
fn parse_gtfs_date(file: &str, value: &str) -> Result<NaiveDate, DataError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| DataError::BadDate {
        file: file.to_string(),
        value: value.to_string(),
    })
}

fn read_required<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>, DataError> {
    match read_optional(dir, file)? {
        Some(rows) => Ok(rows),
        None => Err(DataError::MissingFile(file.to_string())),
    }
}

fn read_optional<T: DeserializeOwned>(
    dir: &Path,
    file: &str,
) -> Result<Option<Vec<T>>, DataError> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(None);
    }
    let reader = std::fs::File::open(&path).map_err(|source| DataError::Io {
        file: file.to_string(),
        source,
    })?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for row in csv_reader.deserialize() {
        let row = row.map_err(|source| DataError::Csv {
            file: file.to_string(),
            source,
        })?;
        rows.push(row);
    }
    Ok(Some(rows))
}
