//! Turns loosely shaped remote records into canonical appointments.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

use crate::limits::*;
use crate::model::*;
use crate::remote::RemoteRecord;
use crate::time::{Period, TimeOfDay};

/// Why a remote record was not accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidRecord {
    NoDate,
    NoTime(String),
    MissingService,
    MissingPrice,
    BadPrice(f64),
    UnknownStatus(String),
    TooLong(&'static str),
    /// The legacy day names a different weekday than the timestamp's date.
    WeekdayMismatch { label: String, date: NaiveDate },
}

impl std::fmt::Display for InvalidRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidRecord::NoDate => write!(f, "neither a usable timestamp nor a weekday"),
            InvalidRecord::NoTime(e) => write!(f, "no usable time of day: {e}"),
            InvalidRecord::MissingService => write!(f, "missing service name"),
            InvalidRecord::MissingPrice => write!(f, "missing price"),
            InvalidRecord::BadPrice(p) => write!(f, "price {p} out of range"),
            InvalidRecord::UnknownStatus(s) => write!(f, "unknown status {s:?}"),
            InvalidRecord::TooLong(field) => write!(f, "{field} too long"),
            InvalidRecord::WeekdayMismatch { label, date } => {
                write!(f, "day {label:?} contradicts date {date}")
            }
        }
    }
}

impl std::error::Error for InvalidRecord {}

/// Parse an ISO-8601 timestamp into local wall-clock time. Offsets are
/// converted; naive timestamps are taken as already local.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn legacy_time(record: &RemoteRecord) -> Result<TimeOfDay, String> {
    let clock = non_blank(&record.time).ok_or("no clock")?;
    let period: Period = non_blank(&record.period)
        .ok_or("no period")?
        .parse()
        .map_err(|e: crate::time::MalformedTime| e.to_string())?;
    TimeOfDay::parse(clock, period).map_err(|e| e.to_string())
}

/// Map a remote record into the canonical shape.
///
/// The timestamp supplies the calendar date. Legacy weekday and clock fields
/// win when they are present and valid; otherwise both are derived from the
/// timestamp. A recognized weekday that contradicts the timestamp's date is
/// rejected; an unrecognized label is ignored.
pub fn parse_record(record: &RemoteRecord) -> Result<Appointment, InvalidRecord> {
    let stamp = record.start_time.as_deref().and_then(parse_timestamp);
    let legacy_day = non_blank(&record.date);
    let legacy_iso = legacy_day.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    let iso_date = stamp.map(|s| s.date()).or(legacy_iso);

    let weekday_label = match (iso_date, legacy_day) {
        (Some(date), Some(label)) => {
            let named = parse_weekday(label).or_else(|| legacy_iso.map(|d| d.weekday()));
            if named.is_some_and(|day| day != date.weekday()) {
                return Err(InvalidRecord::WeekdayMismatch {
                    label: label.to_string(),
                    date,
                });
            }
            weekday_name(date.weekday()).to_string()
        }
        (Some(date), None) => weekday_name(date.weekday()).to_string(),
        (None, Some(label)) => {
            if label.len() > MAX_LABEL_LEN {
                return Err(InvalidRecord::TooLong("weekday label"));
            }
            canonical_weekday_label(label)
        }
        (None, None) => return Err(InvalidRecord::NoDate),
    };

    let time = match (legacy_time(record), stamp) {
        (Ok(t), _) => t,
        (Err(_), Some(s)) => {
            TimeOfDay::from_hm(s.hour(), s.minute()).map_err(|e| InvalidRecord::NoTime(e.0))?
        }
        (Err(e), None) => return Err(InvalidRecord::NoTime(e)),
    };

    let service_name = non_blank(&record.service).ok_or(InvalidRecord::MissingService)?;
    if service_name.len() > MAX_SERVICE_LEN {
        return Err(InvalidRecord::TooLong("service name"));
    }

    let price = record.price.ok_or(InvalidRecord::MissingPrice)?;
    if !price.is_finite() || !(0.0..=MAX_PRICE).contains(&price) {
        return Err(InvalidRecord::BadPrice(price));
    }

    let client = non_blank(&record.client).unwrap_or(CLIENT_PLACEHOLDER);
    if client.len() > MAX_CLIENT_LEN {
        return Err(InvalidRecord::TooLong("client"));
    }

    // Rows written before status tracking have none; they were never completed.
    let status = match non_blank(&record.status) {
        Some(s) => s
            .parse()
            .map_err(|_| InvalidRecord::UnknownStatus(s.to_string()))?,
        None => Status::Pending,
    };

    Ok(Appointment {
        id: record.id,
        weekday_label,
        iso_date,
        time,
        client: client.to_string(),
        service_name: service_name.to_string(),
        price,
        status,
    })
}
