//! Party start time: `HH:MM` or minutes from now.

use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Timelike};
use lazy_static::lazy_static;
use regex::Regex;

use super::error::PartyError;

/// Longest relative offset accepted, one day.
const MAX_MINUTES: u32 = 24 * 60;

lazy_static! {
    static ref CLOCK: Regex = Regex::new(r"^(\d{1,2}):(\d{2})$").expect("clock pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// Wall-clock time; rolls to the next day when not in the future.
    At { hour: u32, minute: u32 },
    /// Minutes from now.
    In { minutes: u32 },
}

impl FromStr for TimeSpec {
    type Err = PartyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(caps) = CLOCK.captures(s) {
            let hour: u32 = caps[1].parse().map_err(|_| PartyError::InvalidTimeFormat)?;
            let minute: u32 = caps[2].parse().map_err(|_| PartyError::InvalidTimeFormat)?;
            if hour > 23 || minute > 59 {
                return Err(PartyError::InvalidTimeFormat);
            }
            return Ok(TimeSpec::At { hour, minute });
        }

        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            let minutes: u32 = s.parse().map_err(|_| PartyError::InvalidTimeFormat)?;
            if minutes == 0 || minutes > MAX_MINUTES {
                return Err(PartyError::InvalidTimeFormat);
            }
            return Ok(TimeSpec::In { minutes });
        }

        Err(PartyError::InvalidTimeFormat)
    }
}

impl TimeSpec {
    /// Absolute time this spec refers to, seen from `now`.
    pub fn resolve(&self, now: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>, PartyError> {
        match *self {
            TimeSpec::In { minutes } => Ok(now + Duration::minutes(i64::from(minutes))),
            TimeSpec::At { hour, minute } => {
                let today = now
                    .with_hour(hour)
                    .and_then(|t| t.with_minute(minute))
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .ok_or(PartyError::InvalidTimeFormat)?;
                if today <= now {
                    Ok(today + Duration::days(1))
                } else {
                    Ok(today)
                }
            }
        }
    }
}
