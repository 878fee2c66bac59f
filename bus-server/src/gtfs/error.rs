//! GTFS data errors.
//!
//! These are fatal to loading a snapshot but never to serving: the server
//! keeps its previous snapshot when a load fails.

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// A required GTFS file is absent from the dataset directory.
    #[error("missing required GTFS file: {0}")]
    MissingFile(String),

    /// Reading a dataset file failed.
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// A row failed CSV deserialization.
    #[error("malformed row in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    /// stop_times.txt references a trip that trips.txt does not define.
    #[error("stop_times.txt references unknown trip {0}")]
    UnknownTrip(String),

    /// Neither calendar.txt nor calendar_dates.txt is present.
    #[error("no service calendar: need calendar.txt or calendar_dates.txt")]
    NoCalendar,

    /// A date field is not in GTFS YYYYMMDD form.
    #[error("invalid date {value:?} in {file}")]
    BadDate { file: String, value: String },
}
