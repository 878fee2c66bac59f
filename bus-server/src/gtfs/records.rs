//! Raw GTFS CSV row shapes.
//!
//! One struct per file, matching the column names GTFS uses so the `csv`
//! crate can deserialize rows directly. Optional columns are `Option` or
//! defaulted; anything the snapshot does not need is simply not listed.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    pub stop_name: String,
}

#[derive(Debug, Deserialize)]
pub struct TripRecord {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    #[serde(default)]
    pub trip_headsign: String,
}

#[derive(Debug, Deserialize)]
pub struct StopTimeRecord {
    pub trip_id: String,
    pub stop_id: String,
    pub departure_time: String,
    #[serde(default)]
    pub stop_sequence: u32,
    #[serde(default)]
    pub stop_headsign: String,
}

/// calendar.txt row: the weekly base pattern for a service.
#[derive(Debug, Deserialize)]
pub struct CalendarRecord {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    pub start_date: String,
    pub end_date: String,
}

/// calendar_dates.txt row: a dated exception to the base pattern.
///
/// `exception_type` 1 adds service on the date, 2 removes it.
#[derive(Debug, Deserialize)]
pub struct CalendarDateRecord {
    pub service_id: String,
    pub date: String,
    pub exception_type: u8,
}
