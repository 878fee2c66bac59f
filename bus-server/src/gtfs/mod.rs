//! GTFS static schedule store.
//!
//! Parses the standard tabular transit files (stops, trips, stop_times,
//! calendar, calendar_dates) into an immutable in-memory [`Snapshot`].
//! The snapshot is read-only during request handling; the update job
//! replaces the on-disk dataset and [`SharedSnapshot::reload`] publishes
//! a freshly parsed copy with a single reference swap.

mod error;
mod records;
mod shared;
mod snapshot;
mod time;

pub use error::DataError;
pub use records::{CalendarDateRecord, CalendarRecord, StopRecord, StopTimeRecord, TripRecord};
pub use shared::SharedSnapshot;
pub use snapshot::{CalendarEntry, Snapshot, Stop, StopTime, Trip};
pub use time::{ServiceTime, TimeError};
