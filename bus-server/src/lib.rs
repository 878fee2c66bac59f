//! Bus arrival server.
//!
//! Loads static GTFS bus-schedule data, computes upcoming arrivals for
//! configured stops, and serves them over HTTP to a LaMetric Time display
//! and an Alexa voice skill. A separate binary, run daily by an external
//! timer, replaces the dataset on disk.

pub mod arrivals;
pub mod config;
pub mod gtfs;
pub mod render;
pub mod update;
pub mod web;
