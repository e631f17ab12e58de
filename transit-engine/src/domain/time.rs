//! Service-day time handling.
//!
//! All schedule times are whole seconds since midnight of the service day.
//! Trips that run past midnight keep counting (GTFS writes these as
//! "25:10:00"), so a `ServiceTime` may exceed 24 hours. Ordering is plain
//! integer ordering; no floating point is involved anywhere.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Latest hour accepted when parsing. Two full days covers every
/// overnight pattern seen in practice.
const MAX_HOURS: u32 = 48;

const SECS_PER_DAY: u32 = 24 * 60 * 60;

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Seconds since midnight of the service day.
///
/// # Examples
///
/// ```
/// use transit_engine::domain::ServiceTime;
///
/// let t = ServiceTime::parse("08:15").unwrap();
/// assert_eq!(t.as_secs(), 8 * 3600 + 15 * 60);
/// assert_eq!(t.to_string(), "08:15");
///
/// // Past midnight on the same service day
/// let late = ServiceTime::parse("25:10:30").unwrap();
/// assert_eq!(late.to_string(), "25:10:30");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceTime(u32);

impl ServiceTime {
    /// Midnight at the start of the service day.
    pub const MIDNIGHT: ServiceTime = ServiceTime(0);

    /// Sentinel for "never reached". Sorts after every real time.
    pub const NEVER: ServiceTime = ServiceTime(u32::MAX);

    /// Create a time from seconds since midnight.
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Create a time from hours, minutes and seconds.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    /// Parse "HH:MM" or "HH:MM:SS". Hours may exceed 23 (up to 47).
    ///
    /// ```
    /// use transit_engine::domain::ServiceTime;
    ///
    /// assert!(ServiceTime::parse("00:00").is_ok());
    /// assert!(ServiceTime::parse("7:05:00").is_ok());
    /// assert!(ServiceTime::parse("24:30:00").is_ok());
    ///
    /// assert!(ServiceTime::parse("0800").is_err());
    /// assert!(ServiceTime::parse("08:60").is_err());
    /// assert!(ServiceTime::parse("48:00").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let s = s.trim();
        let mut parts = s.split(':');

        let hour_part = parts.next().ok_or_else(|| TimeError::new("empty"))?;
        let minute_part = parts
            .next()
            .ok_or_else(|| TimeError::new("expected HH:MM or HH:MM:SS"))?;
        let second_part = parts.next();
        if parts.next().is_some() {
            return Err(TimeError::new("too many components"));
        }

        if hour_part.is_empty() || hour_part.len() > 2 {
            return Err(TimeError::new("invalid hour digits"));
        }
        let hours = parse_digits(hour_part).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        if hours >= MAX_HOURS {
            return Err(TimeError::new("hour must be below 48"));
        }

        let minutes =
            parse_two_digits(minute_part).ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minutes > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        let seconds = match second_part {
            Some(sec) => {
                let seconds =
                    parse_two_digits(sec).ok_or_else(|| TimeError::new("invalid second digits"))?;
                if seconds > 59 {
                    return Err(TimeError::new("second must be 0-59"));
                }
                seconds
            }
            None => 0,
        };

        Ok(Self::from_hms(hours, minutes, seconds))
    }

    /// Convert a wall-clock time to a service time on the same day.
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self(time.num_seconds_from_midnight())
    }

    /// Returns the number of seconds since midnight.
    pub fn as_secs(&self) -> u32 {
        self.0
    }

    /// Returns the hour component (may exceed 23).
    pub fn hour(&self) -> u32 {
        self.0 / 3600
    }

    /// Returns the minute component (0-59).
    pub fn minute(&self) -> u32 {
        (self.0 / 60) % 60
    }

    /// Returns the second component (0-59).
    pub fn second(&self) -> u32 {
        self.0 % 60
    }

    /// Returns true for the "never reached" sentinel.
    pub fn is_never(&self) -> bool {
        *self == Self::NEVER
    }

    /// Add seconds, saturating at the sentinel.
    pub fn plus_secs(self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs).min(u32::MAX - 1))
    }

    /// Subtract seconds, returning `None` before midnight.
    pub fn minus_secs(self, secs: u32) -> Option<Self> {
        self.0.checked_sub(secs).map(Self)
    }

    /// Shift by a signed offset (such as a realtime delay), clamping at midnight.
    pub fn shifted(self, offset_secs: i32) -> Self {
        let shifted = i64::from(self.0) + i64::from(offset_secs);
        Self(shifted.clamp(0, i64::from(u32::MAX - 1)) as u32)
    }

    /// Returns the signed number of seconds from `other` to `self`.
    pub fn secs_since(self, other: Self) -> i64 {
        i64::from(self.0) - i64::from(other.0)
    }

    /// Returns the duration from `other` to `self`.
    pub fn signed_duration_since(self, other: Self) -> Duration {
        Duration::seconds(self.secs_since(other))
    }

    /// Anchor this time to a calendar date.
    ///
    /// Times past 24:00 land on the following day(s).
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        let day_offset = self.0 / SECS_PER_DAY;
        let within_day = self.0 % SECS_PER_DAY;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(within_day, 0)
            .unwrap_or(NaiveTime::MIN);
        date.and_time(time) + Duration::days(i64::from(day_offset))
    }
}

impl fmt::Debug for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            return f.write_str("ServiceTime(never)");
        }
        write!(f, "ServiceTime({self})")
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.second() == 0 {
            write!(f, "{:02}:{:02}", self.hour(), self.minute())
        } else {
            write!(
                f,
                "{:02}:{:02}:{:02}",
                self.hour(),
                self.minute(),
                self.second()
            )
        }
    }
}

impl Serialize for ServiceTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!(
            "{:02}:{:02}:{:02}",
            self.hour(),
            self.minute(),
            self.second()
        ))
    }
}

impl<'de> Deserialize<'de> for ServiceTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ServiceTime::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse exactly two ASCII digits into a u32.
fn parse_two_digits(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_times() {
        let t = ServiceTime::parse("08:00").unwrap();
        assert_eq!(t.as_secs(), 28_800);

        let t = ServiceTime::parse("23:59:59").unwrap();
        assert_eq!(t.hour(), 23);
        assert_eq!(t.minute(), 59);
        assert_eq!(t.second(), 59);

        let t = ServiceTime::parse("7:05").unwrap();
        assert_eq!(t, ServiceTime::from_hms(7, 5, 0));
    }

    #[test]
    fn parse_past_midnight() {
        let t = ServiceTime::parse("26:15:00").unwrap();
        assert_eq!(t.hour(), 26);
        assert_eq!(t.as_secs(), 26 * 3600 + 15 * 60);
    }

    #[test]
    fn reject_invalid() {
        assert!(ServiceTime::parse("").is_err());
        assert!(ServiceTime::parse("08").is_err());
        assert!(ServiceTime::parse("08:5").is_err());
        assert!(ServiceTime::parse("08:00:0").is_err());
        assert!(ServiceTime::parse("08:00:00:00").is_err());
        assert!(ServiceTime::parse("ab:cd").is_err());
        assert!(ServiceTime::parse("123:00").is_err());
        assert!(ServiceTime::parse("12:61").is_err());
        assert!(ServiceTime::parse("12:00:61").is_err());
        assert!(ServiceTime::parse("-1:00").is_err());
    }

    #[test]
    fn display_drops_zero_seconds() {
        assert_eq!(ServiceTime::from_hms(8, 35, 0).to_string(), "08:35");
        assert_eq!(ServiceTime::from_hms(8, 35, 5).to_string(), "08:35:05");
    }

    #[test]
    fn arithmetic() {
        let t = ServiceTime::from_hms(8, 0, 0);
        assert_eq!(t.plus_secs(180), ServiceTime::from_hms(8, 3, 0));
        assert_eq!(t.minus_secs(60), Some(ServiceTime::from_hms(7, 59, 0)));
        assert_eq!(ServiceTime::MIDNIGHT.minus_secs(1), None);
        assert_eq!(t.shifted(-120), ServiceTime::from_hms(7, 58, 0));
        assert_eq!(ServiceTime::from_secs(30).shifted(-60), ServiceTime::MIDNIGHT);
        assert_eq!(
            ServiceTime::from_hms(8, 15, 0).secs_since(ServiceTime::from_hms(8, 0, 0)),
            900
        );
    }

    #[test]
    fn plus_secs_never_reaches_sentinel() {
        let t = ServiceTime::from_secs(u32::MAX - 5);
        assert!(!t.plus_secs(100).is_never());
    }

    #[test]
    fn anchor_to_date_rolls_over() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let late = ServiceTime::parse("25:30").unwrap().on(date);
        assert_eq!(late.date(), NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        assert_eq!(late.time(), NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    }

    #[test]
    fn serde_roundtrip_format() {
        let t = ServiceTime::from_hms(8, 20, 0);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"08:20:00\"");
        let back: ServiceTime = serde_json::from_str("\"08:20\"").unwrap();
        assert_eq!(back, t);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Formatting then parsing yields the same time.
        #[test]
        fn display_parse_roundtrip(secs in 0u32..(48 * 3600)) {
            let t = ServiceTime::from_secs(secs);
            prop_assert_eq!(ServiceTime::parse(&t.to_string()).unwrap(), t);
        }

        /// Ordering agrees with the underlying seconds.
        #[test]
        fn ordering_matches_secs(a in 0u32..200_000, b in 0u32..200_000) {
            let ta = ServiceTime::from_secs(a);
            let tb = ServiceTime::from_secs(b);
            prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
        }

        /// A positive shift never moves a time earlier.
        #[test]
        fn positive_shift_is_monotone(secs in 0u32..200_000, delay in 0i32..7200) {
            let t = ServiceTime::from_secs(secs);
            prop_assert!(t.shifted(delay) >= t);
        }
    }
}
