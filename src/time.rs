//! Clock-string codec. Every time comparison in the crate goes through
//! [`to_minutes`]; there is no second implementation of the 12-hour rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Minutes in a day; valid minute-of-day values are `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: u16 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Am => "AM",
            Period::Pm => "PM",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = MalformedTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" | "A.M." => Ok(Period::Am),
            "PM" | "P.M." => Ok(Period::Pm),
            _ => Err(MalformedTime(format!("unknown period {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTime(pub String);

impl fmt::Display for MalformedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed time: {}", self.0)
    }
}

impl std::error::Error for MalformedTime {}

/// Split `HH[:MM]` into a 12-hour clock pair. Hour must be 1..=12.
fn parse_clock(clock: &str) -> Result<(u16, u16), MalformedTime> {
    let clock = clock.trim();
    let (h, m) = match clock.split_once(':') {
        Some((h, m)) => (h, Some(m)),
        None => (clock, None),
    };
    let hour: u16 = h
        .parse()
        .map_err(|_| MalformedTime(format!("bad hour in {clock:?}")))?;
    let minute: u16 = match m {
        Some(m) => m
            .parse()
            .map_err(|_| MalformedTime(format!("bad minutes in {clock:?}")))?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return Err(MalformedTime(format!("hour out of range in {clock:?}")));
    }
    if minute > 59 {
        return Err(MalformedTime(format!("minutes out of range in {clock:?}")));
    }
    Ok((hour, minute))
}

/// Convert a 12-hour clock string to minutes since midnight (`0..=1439`).
///
/// `12:xx AM` maps to hour 0, `12:xx PM` stays at 12, every other PM hour
/// gains 12. A missing `:MM` part means minute 0.
pub fn to_minutes(clock: &str, period: Period) -> Result<u16, MalformedTime> {
    let (hour, minute) = parse_clock(clock)?;
    let hour24 = match (period, hour) {
        (Period::Am, 12) => 0,
        (Period::Am, h) => h,
        (Period::Pm, 12) => 12,
        (Period::Pm, h) => h + 12,
    };
    Ok(hour24 * 60 + minute)
}

/// Inverse of [`to_minutes`]: canonical zero-padded clock plus period.
pub fn from_minutes(minutes: u16) -> Result<TimeOfDay, MalformedTime> {
    if minutes >= MINUTES_PER_DAY {
        return Err(MalformedTime(format!("{minutes} is past the end of the day")));
    }
    let (hour24, minute) = (minutes / 60, minutes % 60);
    let (hour, period) = match hour24 {
        0 => (12, Period::Am),
        1..=11 => (hour24, Period::Am),
        12 => (12, Period::Pm),
        _ => (hour24 - 12, Period::Pm),
    };
    Ok(TimeOfDay {
        clock: format!("{hour:02}:{minute:02}"),
        period,
    })
}

/// A validated slot time. `clock` is always canonical `hh:mm`, so two values
/// are equal exactly when they name the same minute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimeOfDay {
    clock: String,
    period: Period,
}

impl TimeOfDay {
    pub fn parse(clock: &str, period: Period) -> Result<Self, MalformedTime> {
        let (hour, minute) = parse_clock(clock)?;
        Ok(Self {
            clock: format!("{hour:02}:{minute:02}"),
            period,
        })
    }

    pub fn clock(&self) -> &str {
        &self.clock
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn minutes(&self) -> u16 {
        // `clock` was validated on construction.
        to_minutes(&self.clock, self.period).unwrap_or(0)
    }

    pub fn from_hm(hour24: u32, minute: u32) -> Result<Self, MalformedTime> {
        let total = hour24 * 60 + minute;
        let total = u16::try_from(total)
            .map_err(|_| MalformedTime(format!("{hour24}:{minute} out of range")))?;
        from_minutes(total)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.clock, self.period)
    }
}
