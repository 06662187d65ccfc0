use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::time::TimeOfDay;

/// Shown when a booking is made without a client name.
pub const CLIENT_PLACEHOLDER: &str = "Client";

/// Rank given to labels that name no known weekday. Sorts after Sunday.
pub const UNKNOWN_WEEKDAY_RANK: u8 = 8;

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Completed,
}

impl Status {
    pub fn toggled(self) -> Self {
        match self {
            Status::Pending => Status::Completed,
            Status::Completed => Status::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "completed" => Ok(Status::Completed),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

// ── Weekdays ─────────────────────────────────────────────────────

/// English display name for a weekday.
pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAY_NAMES[day.num_days_from_monday() as usize]
}

/// Recognize a weekday label. Accepts English and the Spanish labels legacy
/// records were written with, case- and accent-insensitively.
pub fn parse_weekday(label: &str) -> Option<Weekday> {
    let folded: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect();
    let day = match folded.as_str() {
        "monday" | "mon" | "lunes" => Weekday::Mon,
        "tuesday" | "tue" | "martes" => Weekday::Tue,
        "wednesday" | "wed" | "miercoles" => Weekday::Wed,
        "thursday" | "thu" | "jueves" => Weekday::Thu,
        "friday" | "fri" | "viernes" => Weekday::Fri,
        "saturday" | "sat" | "sabado" => Weekday::Sat,
        "sunday" | "sun" | "domingo" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Monday = 1 … Sunday = 7; anything unrecognized ranks last.
pub fn weekday_rank(label: &str) -> u8 {
    parse_weekday(label)
        .map(|d| d.number_from_monday() as u8)
        .unwrap_or(UNKNOWN_WEEKDAY_RANK)
}

/// Canonical label: the English name when recognized, the trimmed input otherwise.
pub fn canonical_weekday_label(label: &str) -> String {
    match parse_weekday(label) {
        Some(day) => weekday_name(day).to_string(),
        None => label.trim().to_string(),
    }
}

// ── Date keys and slots ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDate(pub String);

impl fmt::Display for MalformedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed date: {}", self.0)
    }
}

impl std::error::Error for MalformedDate {}

/// What conflict checks and day filters group by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DateKey {
    Date(NaiveDate),
    Weekday(String),
}

impl DateKey {
    /// Parse `YYYY-MM-DD` or a recognized weekday name.
    pub fn parse(s: &str) -> Result<Self, MalformedDate> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(DateKey::Date(date));
        }
        match parse_weekday(s) {
            Some(day) => Ok(DateKey::Weekday(weekday_name(day).to_string())),
            None => Err(MalformedDate(format!("{s:?} is neither YYYY-MM-DD nor a weekday"))),
        }
    }

    pub fn weekday_label(&self) -> String {
        match self {
            DateKey::Date(date) => weekday_name(date.weekday()).to_string(),
            DateKey::Weekday(label) => label.clone(),
        }
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateKey::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DateKey::Weekday(label) => f.write_str(label),
        }
    }
}

/// The discrete `(date_key, time)` pair a booking occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub date_key: DateKey,
    pub time: TimeOfDay,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_key, self.time)
    }
}

// ── Appointment ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub id: Ulid,
    pub weekday_label: String,
    pub iso_date: Option<NaiveDate>,
    pub time: TimeOfDay,
    pub client: String,
    /// Snapshot of the service at booking time; catalog edits never reach it.
    pub service_name: String,
    pub price: f64,
    pub status: Status,
}

impl Appointment {
    pub fn date_key(&self) -> DateKey {
        match self.iso_date {
            Some(date) => DateKey::Date(date),
            None => DateKey::Weekday(self.weekday_label.clone()),
        }
    }

    pub fn slot(&self) -> Slot {
        Slot {
            date_key: self.date_key(),
            time: self.time.clone(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }
}

/// What the caller asks `book` for. Status is not part of it: every booking
/// starts pending.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub date_key: DateKey,
    pub time: TimeOfDay,
    pub client: String,
    pub service_name: String,
    pub price: f64,
}

impl BookingRequest {
    pub fn new(
        date_key: DateKey,
        time: TimeOfDay,
        client: &str,
        service_name: &str,
        price: f64,
    ) -> Self {
        let client = client.trim();
        Self {
            date_key,
            time,
            client: if client.is_empty() {
                CLIENT_PLACEHOLDER.to_string()
            } else {
                client.to_string()
            },
            service_name: service_name.trim().to_string(),
            price,
        }
    }

    pub fn slot(&self) -> Slot {
        Slot {
            date_key: self.date_key.clone(),
            time: self.time.clone(),
        }
    }
}
