//! GTFS time-of-day handling.
//!
//! GTFS gives stop times as "HH:MM:SS" strings measured from the service
//! day's midnight, and hours may exceed 23: a trip that starts before
//! midnight and calls at 01:10 the next morning is written "25:10:00" on
//! the original service date. This module keeps times as seconds past
//! service-day midnight so those values order and subtract correctly.

use std::fmt;

/// Error returned when parsing an invalid GTFS time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid GTFS time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A time of day on a GTFS service day, as seconds past midnight.
///
/// Values past 86400 are legal and represent past-midnight service on the
/// prior service day.
///
/// # Examples
///
/// ```
/// use bus_server::gtfs::ServiceTime;
///
/// let t = ServiceTime::parse("07:15:00").unwrap();
/// assert_eq!(t.clock_hhmm(), "07:15");
///
/// // Past-midnight service wraps on display but not in ordering.
/// let late = ServiceTime::parse("25:10:00").unwrap();
/// assert_eq!(late.clock_hhmm(), "01:10");
/// assert!(late > t);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceTime {
    seconds: u32,
}

impl ServiceTime {
    /// Create a time from raw seconds past service-day midnight.
    pub fn from_seconds(seconds: u32) -> Self {
        Self { seconds }
    }

    /// Create a time from hour/minute/second components.
    ///
    /// Hours above 23 are accepted per the GTFS convention.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            seconds: hours * 3600 + minutes * 60 + seconds,
        }
    }

    /// Parse a GTFS time string, "HH:MM:SS" or "HH:MM".
    ///
    /// # Examples
    ///
    /// ```
    /// use bus_server::gtfs::ServiceTime;
    ///
    /// assert!(ServiceTime::parse("00:00:00").is_ok());
    /// assert!(ServiceTime::parse("23:59:59").is_ok());
    /// assert!(ServiceTime::parse("25:10:00").is_ok());
    /// assert!(ServiceTime::parse("7:05:00").is_ok()); // some feeds omit the leading zero
    ///
    /// assert!(ServiceTime::parse("").is_err());
    /// assert!(ServiceTime::parse("07:60:00").is_err());
    /// assert!(ServiceTime::parse("bogus").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.split(':');

        let hours = parse_component(parts.next(), "missing hour")?;
        let minutes = parse_component(parts.next(), "missing minute")?;
        let seconds = match parts.next() {
            Some(sec) => parse_component(Some(sec), "invalid second")?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(TimeError::new("too many components"));
        }

        if minutes > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }
        if seconds > 59 {
            return Err(TimeError::new("second must be 0-59"));
        }
        // 48 hours is far beyond any real feed; reject garbage like "9999:00".
        if hours > 47 {
            return Err(TimeError::new("hour out of range"));
        }

        Ok(Self::from_hms(hours, minutes, seconds))
    }

    /// Seconds past service-day midnight. May exceed 86400.
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Whole minutes from `now` until this time, negative if already past.
    pub fn minutes_after(&self, now: Self) -> i64 {
        (i64::from(self.seconds) - i64::from(now.seconds)) / 60
    }

    /// Wall-clock rendering, "HH:MM", normalized modulo 24 hours so that
    /// "25:10:00" displays as "01:10".
    pub fn clock_hhmm(&self) -> String {
        let total_minutes = self.seconds / 60;
        let hours = (total_minutes / 60) % 24;
        let minutes = total_minutes % 60;
        format!("{hours:02}:{minutes:02}")
    }
}

fn parse_component(part: Option<&str>, reason: &'static str) -> Result<u32, TimeError> {
    let part = part.ok_or_else(|| TimeError::new(reason))?;
    if part.is_empty() || part.len() > 4 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeError::new(reason));
    }
    part.parse().map_err(|_| TimeError::new(reason))
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds / 60) % 60;
        let seconds = self.seconds % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl fmt::Debug for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceTime({self})")
    }
}
