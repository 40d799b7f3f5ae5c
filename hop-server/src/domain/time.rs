//! Time handling for the carrier's availability feed.
//!
//! The feed reports every instant as an ISO-like local string plus a
//! timezone label such as `"UTC+2"`. The instant it sends has the offset
//! applied with the wrong sign: adding the offset once more gives local
//! time, and subtracting it twice gives true UTC. All instants in this
//! crate are naive UTC after [`correct_feed_instant`].

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing an invalid time or offset string.
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

/// A timezone label from the feed, stored as signed minutes east of UTC.
///
/// # Examples
///
/// ```
/// use hop_server::domain::FeedOffset;
///
/// assert_eq!(FeedOffset::parse("UTC").unwrap().minutes(), 0);
/// assert_eq!(FeedOffset::parse("UTC+2").unwrap().minutes(), 120);
/// assert_eq!(FeedOffset::parse("UTC-5").unwrap().minutes(), -300);
/// assert_eq!(FeedOffset::parse("UTC+5:30").unwrap().minutes(), 330);
/// assert_eq!(FeedOffset::parse("UTC+2").unwrap().to_string(), "UTC+2");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeedOffset(i32);

impl FeedOffset {
    /// The zero offset.
    pub const UTC: FeedOffset = FeedOffset(0);

    /// Construct from whole hours.
    pub fn from_hours(hours: i32) -> Self {
        Self(hours * 60)
    }

    /// Parse a label of the form `UTC`, `UTC+H`, `UTC-HH`, `UTC+H:MM`.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let rest = s
            .trim()
            .strip_prefix("UTC")
            .ok_or_else(|| TimeError::new("offset must start with UTC"))?;

        if rest.is_empty() {
            return Ok(Self::UTC);
        }

        let (sign, digits) = match rest.as_bytes()[0] {
            b'+' => (1, &rest[1..]),
            b'-' => (-1, &rest[1..]),
            _ => return Err(TimeError::new("expected + or - after UTC")),
        };

        let (hours, minutes) = match digits.split_once(':') {
            Some((h, m)) => (h, m),
            None => (digits, "0"),
        };

        let hours: i32 = hours
            .parse()
            .map_err(|_| TimeError::new("invalid offset hours"))?;
        let minutes: i32 = minutes
            .parse()
            .map_err(|_| TimeError::new("invalid offset minutes"))?;

        if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(TimeError::new("offset out of range"));
        }

        Ok(Self(sign * (hours * 60 + minutes)))
    }

    /// Signed minutes east of UTC.
    pub fn minutes(&self) -> i32 {
        self.0
    }

    /// The offset as a Duration.
    pub fn as_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }

    /// Convert a UTC instant to local wall-clock time at this offset.
    pub fn to_local(&self, utc: NaiveDateTime) -> NaiveDateTime {
        utc + self.as_duration()
    }

    /// The local calendar date of a UTC instant at this offset.
    pub fn local_date(&self, utc: NaiveDateTime) -> NaiveDate {
        self.to_local(utc).date()
    }
}

impl fmt::Debug for FeedOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedOffset({self})")
    }
}

impl fmt::Display for FeedOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("UTC");
        }
        let sign = if self.0 < 0 { '-' } else { '+' };
        let abs = self.0.abs();
        let (hours, minutes) = (abs / 60, abs % 60);
        if minutes == 0 {
            write!(f, "UTC{sign}{hours}")
        } else {
            write!(f, "UTC{sign}{hours}:{minutes:02}")
        }
    }
}

impl Serialize for FeedOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeedOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FeedOffset::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse a feed date-time such as `2025-03-01T10:15:00`, `2025-03-01 10:15`
/// or `2025-03-01T10:15:00.000Z`. Anything after the seconds is ignored.
pub fn parse_feed_datetime(s: &str) -> Result<NaiveDateTime, TimeError> {
    let s = s.trim();
    if s.len() < 16 || !s.is_char_boundary(10) {
        return Err(TimeError::new("expected YYYY-MM-DD HH:MM"));
    }

    let (date, rest) = s.split_at(10);
    let rest = rest
        .strip_prefix('T')
        .or_else(|| rest.strip_prefix(' '))
        .ok_or_else(|| TimeError::new("expected T or space between date and time"))?;

    let time = if rest.len() >= 8 && rest.is_char_boundary(8) {
        &rest[..8]
    } else if rest.len() >= 5 && rest.is_char_boundary(5) {
        &rest[..5]
    } else {
        return Err(TimeError::new("expected HH:MM"));
    };

    let format = if time.len() == 8 {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%Y-%m-%d %H:%M"
    };

    NaiveDateTime::parse_from_str(&format!("{date} {time}"), format)
        .map_err(|_| TimeError::new("unparseable date-time"))
}

/// Undo the feed's offset defect: the true UTC instant is the reported
/// instant minus twice the offset.
///
/// ```
/// use hop_server::domain::{FeedOffset, correct_feed_instant, parse_feed_datetime};
///
/// let reported = parse_feed_datetime("2025-03-01T14:00:00").unwrap();
/// let utc = correct_feed_instant(reported, FeedOffset::from_hours(2));
/// assert_eq!(utc, parse_feed_datetime("2025-03-01T10:00:00").unwrap());
/// ```
pub fn correct_feed_instant(reported: NaiveDateTime, offset: FeedOffset) -> NaiveDateTime {
    reported - offset.as_duration() * 2
}

/// Format a duration the short way: `"1d 2h 5m"`, `"3h"`, `"45m"`.
///
/// Zero components are omitted; a zero or negative duration is `"0m"`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_minutes();
    if total <= 0 {
        return "0m".to_string();
    }

    let days = total / (24 * 60);
    let hours = (total % (24 * 60)) / 60;
    let minutes = total % 60;

    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.join(" ")
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn offset_display_roundtrip(hours in -14i32..=14, minutes in prop::sample::select(vec![0, 30, 45])) {
            let total = if hours < 0 { hours * 60 - minutes } else { hours * 60 + minutes };
            prop_assume!(total.abs() <= 14 * 60 + 59);
            let offset = FeedOffset(total);
            let parsed = FeedOffset::parse(&offset.to_string()).unwrap();
            prop_assert_eq!(parsed, offset);
        }

        #[test]
        fn correction_is_invertible(mins in -600i64..600, offset_hours in -12i32..=12) {
            let base = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
            let utc = base + Duration::minutes(mins);
            let offset = FeedOffset::from_hours(offset_hours);
            let reported = utc + offset.as_duration() * 2;
            prop_assert_eq!(correct_feed_instant(reported, offset), utc);
        }

        #[test]
        fn formatted_duration_sums_back(total in 1i64..100_000) {
            let text = format_duration(Duration::minutes(total));
            let mut sum = 0;
            for part in text.split(' ') {
                let (num, unit) = part.split_at(part.len() - 1);
                let n: i64 = num.parse().unwrap();
                sum += match unit {
                    "d" => n * 24 * 60,
                    "h" => n * 60,
                    _ => n,
                };
            }
            prop_assert_eq!(sum, total);
        }
    }
}
