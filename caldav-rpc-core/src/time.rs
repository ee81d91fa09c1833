//! Calendar timestamp values.
//!
//! A `CalTime` keeps the same distinctions iCalendar makes: all-day dates,
//! UTC instants, floating local times and local times pinned to an IANA zone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalTime {
    /// All-day value (`VALUE=DATE`)
    Date(NaiveDate),
    /// Absolute instant (`...Z`)
    Utc(DateTime<Utc>),
    /// Local time without zone information
    Floating(NaiveDateTime),
    /// Local time in a named zone (`TZID=...`)
    Zoned { datetime: NaiveDateTime, tzid: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseTimeError(pub String);

const LOCAL_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

impl CalTime {
    /// Parse the JSON text form.
    ///
    /// Accepts `2023-10-15`, `2023-10-15T10:00:00`, RFC 3339 values with `Z` or
    /// an offset (normalised to UTC), and `2023-10-15T10:00:00[Europe/Berlin]`.
    pub fn parse(input: &str) -> Result<Self, ParseTimeError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ParseTimeError("empty timestamp".into()));
        }

        if let Some(local) = s.strip_suffix(']') {
            let (local, tzid) = local
                .split_once('[')
                .ok_or_else(|| ParseTimeError(format!("invalid timestamp: {input}")))?;
            if tzid.parse::<Tz>().is_err() {
                return Err(ParseTimeError(format!("unknown time zone: {tzid}")));
            }
            let datetime = parse_local(local)
                .ok_or_else(|| ParseTimeError(format!("invalid timestamp: {input}")))?;
            return Ok(CalTime::Zoned {
                datetime,
                tzid: tzid.to_string(),
            });
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(CalTime::Date(date));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(CalTime::Utc(truncate(dt.naive_utc()).and_utc()));
        }

        parse_local(s)
            .map(CalTime::Floating)
            .ok_or_else(|| ParseTimeError(format!("invalid timestamp: {input}")))
    }

    pub fn is_date(&self) -> bool {
        matches!(self, CalTime::Date(_))
    }

    /// The instant used for ordering.
    ///
    /// Dates count from midnight and floating times are read as UTC. Zoned
    /// times that fall into a DST gap also fall back to UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            CalTime::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
            CalTime::Utc(dt) => *dt,
            CalTime::Floating(dt) => dt.and_utc(),
            CalTime::Zoned { datetime, tzid } => tzid
                .parse::<Tz>()
                .ok()
                .and_then(|tz| tz.from_local_datetime(datetime).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| datetime.and_utc()),
        }
    }

    /// Add a duration, keeping the variant. `None` when the result is out of
    /// range.
    pub fn checked_add(&self, duration: chrono::Duration) -> Option<Self> {
        let time = match self {
            CalTime::Date(d) => {
                CalTime::Date(d.checked_add_signed(chrono::Duration::try_days(duration.num_days())?)?)
            }
            CalTime::Utc(dt) => CalTime::Utc(dt.checked_add_signed(duration)?),
            CalTime::Floating(dt) => CalTime::Floating(dt.checked_add_signed(duration)?),
            CalTime::Zoned { datetime, tzid } => CalTime::Zoned {
                datetime: datetime.checked_add_signed(duration)?,
                tzid: tzid.clone(),
            },
        };
        Some(time)
    }
}

fn parse_local(s: &str) -> Option<NaiveDateTime> {
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(truncate)
}

/// iCalendar has second precision.
fn truncate(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

impl fmt::Display for CalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CalTime::Utc(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            CalTime::Floating(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            CalTime::Zoned { datetime, tzid } => {
                write!(f, "{}[{}]", datetime.format("%Y-%m-%dT%H:%M:%S"), tzid)
            }
        }
    }
}

impl Serialize for CalTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
